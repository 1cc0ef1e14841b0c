//! Order line primitives.
//!
//! Each line freezes the product name, SKU and unit price as they were at
//! checkout, so later catalog edits never rewrite history.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    pub fn new(
        order_id: Uuid,
        product_id: Uuid,
        product_name: String,
        product_sku: String,
        quantity: i32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            product_name,
            product_sku,
            quantity,
            unit_price,
            line_total: Money::new(unit_price.cents() * i64::from(quantity)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Product,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&OrderItem> for ActiveModel {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: ActiveValue::Set(item.id.to_string()),
            order_id: ActiveValue::Set(item.order_id.to_string()),
            product_id: ActiveValue::Set(item.product_id.to_string()),
            product_name: ActiveValue::Set(item.product_name.clone()),
            product_sku: ActiveValue::Set(item.product_sku.clone()),
            quantity: ActiveValue::Set(item.quantity),
            unit_price_minor: ActiveValue::Set(item.unit_price.cents()),
            line_total_minor: ActiveValue::Set(item.line_total.cents()),
        }
    }
}

impl TryFrom<Model> for OrderItem {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "order_item_id")?,
            order_id: util::parse_uuid(&model.order_id, "order_id")?,
            product_id: util::parse_uuid(&model.product_id, "product_id")?,
            product_name: model.product_name,
            product_sku: model.product_sku,
            quantity: model.quantity,
            unit_price: Money::new(model.unit_price_minor),
            line_total: Money::new(model.line_total_minor),
        })
    }
}
