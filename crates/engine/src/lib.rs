//! Storefront engine: category tree, product catalog, cart reconciliation
//! and checkout over a `sea-orm` database.
//!
//! The [`Engine`] is the only entry point. Build it with a database
//! connection and call the async operations; each one runs inside its own
//! database transaction.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), engine::EngineError> {
//! use engine::{CreateCategoryCmd, Engine};
//!
//! let db = sea_orm::Database::connect("sqlite::memory:").await?;
//! let engine = Engine::builder().database(db).build().await?;
//! let root = engine.create_category(CreateCategoryCmd::new("Electronics")).await?;
//! println!("{}", engine.category_path(root).await?);
//! # Ok(())
//! # }
//! ```

pub use cart_items::CartItem;
pub use categories::Category;
pub use commands::{
    CartLine, CheckoutCmd, CreateCategoryCmd, CreateProductCmd, CreateUserCmd, UpdateCartCmd,
    UpdateCategoryCmd, UpdateProductCmd,
};
pub use error::EngineError;
pub use money::{Money, TaxRate};
pub use ops::{
    CartIssueKind, CartItemIssue, CartLineFailure, CartSyncAction, CartSyncReport,
    CartUpdateReport, Engine, EngineBuilder, ProductListFilter,
};
pub use order_items::OrderItem;
pub use orders::{Order, OrderStatus, OrderTotals, PaymentMethod};
pub use products::Product;
pub use users::User;

mod cart_items;
mod categories;
mod commands;
mod error;
mod money;
mod ops;
mod order_items;
mod orders;
mod products;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
