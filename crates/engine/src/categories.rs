//! Catalog category primitives.
//!
//! Categories form a tree through `parent_id`. A `None` parent marks a root.
//! The engine guarantees the tree stays acyclic; every mutation that touches
//! `parent_id` goes through a cycle check before it is persisted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// URL-safe identifier, unique across the whole tree.
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Position among siblings; lower sorts first.
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        name: String,
        slug: String,
        description: Option<String>,
        parent_id: Option<Uuid>,
        sort_order: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            description,
            parent_id,
            sort_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Parent,
    #[sea_orm(has_many = "super::products::Entity")]
    Products,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id.to_string()),
            name: ActiveValue::Set(category.name.clone()),
            slug: ActiveValue::Set(category.slug.clone()),
            description: ActiveValue::Set(category.description.clone()),
            parent_id: ActiveValue::Set(category.parent_id.map(|id| id.to_string())),
            sort_order: ActiveValue::Set(category.sort_order),
            is_active: ActiveValue::Set(category.is_active),
            created_at: ActiveValue::Set(category.created_at),
            updated_at: ActiveValue::Set(category.updated_at),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "category_id")?,
            name: model.name,
            slug: model.slug,
            description: model.description,
            parent_id: model
                .parent_id
                .as_deref()
                .map(|id| util::parse_uuid(id, "category_id"))
                .transpose()?,
            sort_order: model.sort_order,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
