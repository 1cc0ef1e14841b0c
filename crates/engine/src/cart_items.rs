//! Cart line primitives.
//!
//! A cart is the set of `CartItem` rows for one user, at most one row per
//! product. `unit_price` is a snapshot of the product price taken when the
//! line was created; `sync_cart` refreshes it against the live catalog.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(user_id: Uuid, product_id: Uuid, quantity: i32, unit_price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot price times quantity, `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CartItem> for ActiveModel {
    fn from(item: &CartItem) -> Self {
        Self {
            id: ActiveValue::Set(item.id.to_string()),
            user_id: ActiveValue::Set(item.user_id.to_string()),
            product_id: ActiveValue::Set(item.product_id.to_string()),
            quantity: ActiveValue::Set(item.quantity),
            unit_price_minor: ActiveValue::Set(item.unit_price.cents()),
            created_at: ActiveValue::Set(item.created_at),
            updated_at: ActiveValue::Set(item.updated_at),
        }
    }
}

impl TryFrom<Model> for CartItem {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "cart_item_id")?,
            user_id: util::parse_uuid(&model.user_id, "user_id")?,
            product_id: util::parse_uuid(&model.product_id, "product_id")?,
            quantity: model.quantity,
            unit_price: Money::new(model.unit_price_minor),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
