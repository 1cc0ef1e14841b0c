//! Product catalog primitives.
//!
//! `price` is the live unit price in integer cents; cart lines and order
//! items snapshot it at write time. `stock_quantity` is the live available
//! stock that cart writes validate against.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Merchant stock-keeping unit, unique across the catalog.
    pub sku: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        name: String,
        sku: String,
        description: Option<String>,
        price: Money,
        stock_quantity: i32,
        category_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            sku,
            description,
            price,
            stock_quantity,
            is_active: true,
            category_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price_minor: i64,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub category_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Category,
    #[sea_orm(has_many = "super::cart_items::Entity")]
    CartItems,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::cart_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Product> for ActiveModel {
    fn from(product: &Product) -> Self {
        Self {
            id: ActiveValue::Set(product.id.to_string()),
            name: ActiveValue::Set(product.name.clone()),
            sku: ActiveValue::Set(product.sku.clone()),
            description: ActiveValue::Set(product.description.clone()),
            price_minor: ActiveValue::Set(product.price.cents()),
            stock_quantity: ActiveValue::Set(product.stock_quantity),
            is_active: ActiveValue::Set(product.is_active),
            category_id: ActiveValue::Set(product.category_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(product.created_at),
            updated_at: ActiveValue::Set(product.updated_at),
        }
    }
}

impl TryFrom<Model> for Product {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "product_id")?,
            name: model.name,
            sku: model.sku,
            description: model.description,
            price: Money::new(model.price_minor),
            stock_quantity: model.stock_quantity,
            is_active: model.is_active,
            category_id: model
                .category_id
                .as_deref()
                .map(|id| util::parse_uuid(id, "category_id"))
                .transpose()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
