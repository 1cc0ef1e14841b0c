//! Command structs for engine operations.
//!
//! These types group parameters for write operations (catalog edits, batch
//! cart updates, checkout), keeping call sites readable and avoiding long
//! argument lists.

use uuid::Uuid;

use crate::{Money, PaymentMethod, TaxRate};

/// Create a shopper account.
#[derive(Clone, Debug)]
pub struct CreateUserCmd {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl CreateUserCmd {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
        }
    }
}

/// Create a catalog product.
#[derive(Clone, Debug)]
pub struct CreateProductCmd {
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub description: Option<String>,
    pub stock_quantity: i32,
    pub category_id: Option<Uuid>,
}

impl CreateProductCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, sku: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            sku: sku.into(),
            price,
            description: None,
            stock_quantity: 0,
            category_id: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn stock_quantity(mut self, stock_quantity: i32) -> Self {
        self.stock_quantity = stock_quantity;
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// Update a catalog product.
///
/// `Some(...)` replaces a field, `None` leaves it unchanged. An empty
/// description clears the stored one.
#[derive(Clone, Debug, Default)]
pub struct UpdateProductCmd {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
}

impl UpdateProductCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }
}

/// Create a category.
///
/// When `slug` is omitted it is derived from the name. When `sort_order` is
/// omitted the category is appended after its siblings.
#[derive(Clone, Debug)]
pub struct CreateCategoryCmd {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
}

impl CreateCategoryCmd {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            description: None,
            parent_id: None,
            sort_order: None,
        }
    }

    #[must_use]
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = Some(sort_order);
        self
    }
}

/// Update a category's own fields.
///
/// Parent changes go through `move_category`; the slug is stable once
/// assigned. `Some(...)` replaces a field, `None` leaves it unchanged. An
/// empty description clears the stored one.
#[derive(Clone, Debug, Default)]
pub struct UpdateCategoryCmd {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
}

impl UpdateCategoryCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = Some(sort_order);
        self
    }
}

/// One requested cart line in a batch update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl CartLine {
    #[must_use]
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Batch cart update.
///
/// Directives are mutually exclusive and applied in priority order: `clear`
/// wins over `sync`, which wins over `items`.
#[derive(Clone, Debug, Default)]
pub struct UpdateCartCmd {
    pub clear: bool,
    pub sync: bool,
    pub items: Option<Vec<CartLine>>,
}

impl UpdateCartCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn clear(mut self) -> Self {
        self.clear = true;
        self
    }

    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    #[must_use]
    pub fn items(mut self, items: Vec<CartLine>) -> Self {
        self.items = Some(items);
        self
    }
}

/// Convert the current cart into an order.
#[derive(Clone, Debug)]
pub struct CheckoutCmd {
    pub shipping_name: String,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub tax_rate: Option<TaxRate>,
    pub shipping_fee: Money,
    pub discount: Money,
    pub notes: Option<String>,
}

impl CheckoutCmd {
    #[must_use]
    pub fn new(
        shipping_name: impl Into<String>,
        shipping_address: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            shipping_name: shipping_name.into(),
            shipping_address: shipping_address.into(),
            payment_method,
            tax_rate: None,
            shipping_fee: Money::ZERO,
            discount: Money::ZERO,
            notes: None,
        }
    }

    #[must_use]
    pub fn tax_rate(mut self, tax_rate: TaxRate) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }

    #[must_use]
    pub fn shipping_fee(mut self, shipping_fee: Money) -> Self {
        self.shipping_fee = shipping_fee;
        self
    }

    #[must_use]
    pub fn discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
