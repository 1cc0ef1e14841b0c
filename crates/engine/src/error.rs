//! The module contains the errors the engine can throw.
//!
//! The main families are:
//!
//! - [`NotFound`] thrown when a lookup misses.
//! - [`CircularReference`] thrown when a category move would create a cycle.
//! - [`InsufficientStock`] thrown when a cart write exceeds live stock.
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`CircularReference`]: EngineError::CircularReference
//!  [`InsufficientStock`]: EngineError::InsufficientStock
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} with {field} '{value}' already exists")]
    AlreadyExists {
        entity: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("invalid {field}: {reason}")]
    InvalidData { field: &'static str, reason: String },
    #[error("cannot move category '{category_id}' under '{new_parent_id}': would create a cycle")]
    CircularReference {
        category_id: Uuid,
        new_parent_id: Uuid,
    },
    #[error("insufficient stock for product '{product_id}': requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
    #[error("invalid quantity {quantity}: must be between {min} and {max}")]
    InvalidQuantity { quantity: i32, min: i32, max: i32 },
    #[error("cart for user '{user_id}' already holds {limit} distinct products")]
    CartLimitReached { user_id: Uuid, limit: u32 },
    #[error("{entity} '{id}' does not belong to user '{user_id}'")]
    OwnershipDenied {
        entity: &'static str,
        id: Uuid,
        user_id: Uuid,
    },
    #[error("{operation} failed: {reason}")]
    ProcessingFailure {
        operation: &'static str,
        reason: String,
    },
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::NotFound { entity: a, id: b },
                Self::NotFound {
                    entity: a2,
                    id: b2,
                },
            ) => a == a2 && b == b2,
            (
                Self::AlreadyExists {
                    entity: a,
                    field: b,
                    value: c,
                },
                Self::AlreadyExists {
                    entity: a2,
                    field: b2,
                    value: c2,
                },
            ) => a == a2 && b == b2 && c == c2,
            (
                Self::InvalidData {
                    field: a,
                    reason: b,
                },
                Self::InvalidData {
                    field: a2,
                    reason: b2,
                },
            ) => a == a2 && b == b2,
            (
                Self::CircularReference {
                    category_id: a,
                    new_parent_id: b,
                },
                Self::CircularReference {
                    category_id: a2,
                    new_parent_id: b2,
                },
            ) => a == a2 && b == b2,
            (
                Self::InsufficientStock {
                    product_id: a,
                    requested: b,
                    available: c,
                },
                Self::InsufficientStock {
                    product_id: a2,
                    requested: b2,
                    available: c2,
                },
            ) => a == a2 && b == b2 && c == c2,
            (
                Self::InvalidQuantity {
                    quantity: a,
                    min: b,
                    max: c,
                },
                Self::InvalidQuantity {
                    quantity: a2,
                    min: b2,
                    max: c2,
                },
            ) => a == a2 && b == b2 && c == c2,
            (
                Self::CartLimitReached {
                    user_id: a,
                    limit: b,
                },
                Self::CartLimitReached {
                    user_id: a2,
                    limit: b2,
                },
            ) => a == a2 && b == b2,
            (
                Self::OwnershipDenied {
                    entity: a,
                    id: b,
                    user_id: c,
                },
                Self::OwnershipDenied {
                    entity: a2,
                    id: b2,
                    user_id: c2,
                },
            ) => a == a2 && b == b2 && c == c2,
            (
                Self::ProcessingFailure {
                    operation: a,
                    reason: b,
                },
                Self::ProcessingFailure {
                    operation: a2,
                    reason: b2,
                },
            ) => a == a2 && b == b2,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
