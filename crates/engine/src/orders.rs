//! Order primitives.
//!
//! An `Order` freezes the cart at checkout time: totals and per-line product
//! data are snapshots and never change when the live catalog does. Status
//! moves freely between non-terminal states; `Delivered` and `Cancelled` are
//! terminal.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, util};

use super::order_items;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses reject further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidData {
                field: "status",
                reason: format!("invalid order status: {other}"),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit_card" => Ok(Self::CreditCard),
            "paypal" => Ok(Self::Paypal),
            "bank_transfer" => Ok(Self::BankTransfer),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            other => Err(EngineError::InvalidData {
                field: "payment_method",
                reason: format!("invalid payment method: {other}"),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub shipping_name: String,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_fee: Money,
    pub discount: Money,
    pub total: Money,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<order_items::OrderItem>,
}

pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_fee: Money,
    pub discount: Money,
    pub total: Money,
}

impl Order {
    pub fn new(
        user_id: Uuid,
        shipping_name: String,
        shipping_address: String,
        payment_method: PaymentMethod,
        totals: OrderTotals,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            shipping_name,
            shipping_address,
            payment_method,
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping_fee: totals.shipping_fee,
            discount: totals.discount,
            total: totals.total,
            tracking_number: None,
            notes,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub shipping_name: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub shipping_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    Items,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Order> for ActiveModel {
    fn from(order: &Order) -> Self {
        Self {
            id: ActiveValue::Set(order.id.to_string()),
            user_id: ActiveValue::Set(order.user_id.to_string()),
            status: ActiveValue::Set(order.status.as_str().to_string()),
            shipping_name: ActiveValue::Set(order.shipping_name.clone()),
            shipping_address: ActiveValue::Set(order.shipping_address.clone()),
            payment_method: ActiveValue::Set(order.payment_method.as_str().to_string()),
            subtotal_minor: ActiveValue::Set(order.subtotal.cents()),
            tax_minor: ActiveValue::Set(order.tax.cents()),
            shipping_minor: ActiveValue::Set(order.shipping_fee.cents()),
            discount_minor: ActiveValue::Set(order.discount.cents()),
            total_minor: ActiveValue::Set(order.total.cents()),
            tracking_number: ActiveValue::Set(order.tracking_number.clone()),
            notes: ActiveValue::Set(order.notes.clone()),
            created_at: ActiveValue::Set(order.created_at),
            updated_at: ActiveValue::Set(order.updated_at),
        }
    }
}

impl TryFrom<Model> for Order {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "order_id")?,
            user_id: util::parse_uuid(&model.user_id, "user_id")?,
            status: OrderStatus::try_from(model.status.as_str())?,
            shipping_name: model.shipping_name,
            shipping_address: model.shipping_address,
            payment_method: PaymentMethod::try_from(model.payment_method.as_str())?,
            subtotal: Money::new(model.subtotal_minor),
            tax: Money::new(model.tax_minor),
            shipping_fee: Money::new(model.shipping_minor),
            discount: Money::new(model.discount_minor),
            total: Money::new(model.total_minor),
            tracking_number: model.tracking_number,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
            items: Vec::new(),
        })
    }
}
