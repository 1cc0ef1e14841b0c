use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    CartItem, EngineError, Money, ResultEngine, TaxRate, UpdateCartCmd, cart_items, products, util,
};

use super::{Engine, with_tx};

const MIN_QUANTITY: i32 = 1;
const MAX_QUANTITY: i32 = 99;
const MAX_CART_LINES: u32 = 50;

/// One skipped line of a best-effort batch update.
#[derive(Debug)]
pub struct CartLineFailure {
    pub product_id: Uuid,
    pub error: EngineError,
}

/// Outcome of [`Engine::update_cart`]: the resulting cart plus every line
/// that was skipped. An empty `failures` list means the whole batch applied.
#[derive(Debug, Default)]
pub struct CartUpdateReport {
    pub items: Vec<CartItem>,
    pub failures: Vec<CartLineFailure>,
}

/// One repair applied by [`Engine::sync_cart`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartSyncAction {
    /// The line was deleted.
    Removed { product_id: Uuid, reason: String },
    /// The stored price snapshot was refreshed to the live catalog price.
    Repriced {
        product_id: Uuid,
        from: Money,
        to: Money,
    },
    /// The quantity was clamped down to the available stock.
    Clamped {
        product_id: Uuid,
        from: i32,
        to: i32,
    },
}

/// Outcome of [`Engine::sync_cart`]: the repaired cart plus the repairs
/// applied. Lines that needed no repair do not appear in `actions`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartSyncReport {
    pub items: Vec<CartItem>,
    pub actions: Vec<CartSyncAction>,
}

/// Why [`Engine::validate_cart_items`] flagged a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartIssueKind {
    /// The product is gone or deactivated.
    Inactive,
    /// Live stock no longer covers the line quantity.
    OutOfStock { available: i32 },
    /// The live price differs from the stored snapshot.
    PriceDrift { current: Money },
}

/// One flagged cart line. The next [`Engine::sync_cart`] would repair it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartItemIssue {
    pub item: CartItem,
    pub kind: CartIssueKind,
}

fn validate_quantity(quantity: i32) -> ResultEngine<()> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(EngineError::InvalidQuantity {
            quantity,
            min: MIN_QUANTITY,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

fn ensure_stock(product: &products::Model, product_id: Uuid, requested: i32) -> ResultEngine<()> {
    if product.stock_quantity < requested {
        return Err(EngineError::InsufficientStock {
            product_id,
            requested,
            available: product.stock_quantity,
        });
    }
    Ok(())
}

impl Engine {
    /// Returns the cart lines of a user, oldest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn cart(&self, user_id: Uuid) -> ResultEngine<Vec<CartItem>> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.cart_items_of(&db_tx, user_id).await
        })
    }

    /// Puts `quantity` units of a product into the cart.
    ///
    /// If a line for this product already exists the quantity is **added** to
    /// it, and the combined quantity is re-validated against the per-item cap
    /// and live stock. A new line snapshots the current product price.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidQuantity`] if the requested or combined
    ///   quantity leaves `[1, 99]`
    /// - [`EngineError::NotFound`] if the user or product does not exist
    /// - [`EngineError::InvalidData`] if the product is deactivated
    /// - [`EngineError::InsufficientStock`] if live stock cannot cover the
    ///   requested or combined quantity
    /// - [`EngineError::CartLimitReached`] if a new line would exceed the
    ///   50-distinct-product cap
    pub async fn add_item_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> ResultEngine<CartItem> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.add_line(&db_tx, user_id, product_id, quantity).await
        })
    }

    /// Replaces the quantity of an existing cart line.
    ///
    /// Unlike [`Engine::add_item_to_cart`] this **replaces** the stored
    /// quantity rather than adding to it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidQuantity`] if `quantity` leaves `[1, 99]`
    /// - [`EngineError::NotFound`] if the line does not exist
    /// - [`EngineError::OwnershipDenied`] if the line belongs to another user
    /// - [`EngineError::InsufficientStock`] if live stock cannot cover it
    pub async fn update_cart_item_quantity(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> ResultEngine<CartItem> {
        with_tx!(self, |db_tx| {
            let line = self
                .require_cart_item_owned(&db_tx, user_id, cart_item_id)
                .await?;
            self.set_line_quantity(&db_tx, line, quantity).await
        })
    }

    /// Removes a cart line by its id.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the line does not exist
    /// - [`EngineError::OwnershipDenied`] if the line belongs to another user
    pub async fn remove_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let line = self
                .require_cart_item_owned(&db_tx, user_id, cart_item_id)
                .await?;
            cart_items::Entity::delete_by_id(line.id).exec(&db_tx).await?;
            Ok(())
        })
    }

    /// Removes the cart line holding a given product.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the user does not exist, or the product
    ///   is not in the cart
    pub async fn remove_product_from_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let line = self
                .cart_line_for_product(&db_tx, user_id, product_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "cart item",
                    id: product_id.to_string(),
                })?;
            cart_items::Entity::delete_by_id(line.id).exec(&db_tx).await?;
            Ok(())
        })
    }

    /// Deletes every cart line of a user. Idempotent.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn clear_cart(&self, user_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.delete_cart_lines(&db_tx, user_id).await
        })
    }

    /// Batch cart update with three mutually exclusive directives, applied in
    /// priority order: `clear` wins over `sync`, which wins over `items`.
    ///
    /// The item list is applied best-effort: each requested line is an upsert
    /// (replace the quantity if the product is already in the cart, add it
    /// otherwise), and a line that fails validation is skipped, logged and
    /// reported in `failures` while the rest of the batch continues. The
    /// batch is never atomic.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists. Per-line failures do
    /// not error; they are collected in the report.
    pub async fn update_cart(
        &self,
        user_id: Uuid,
        cmd: UpdateCartCmd,
    ) -> ResultEngine<CartUpdateReport> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            // An early `return` would skip the commit in `with_tx!`.
            if cmd.clear {
                self.delete_cart_lines(&db_tx, user_id).await?;
                Ok(CartUpdateReport::default())
            } else if cmd.sync {
                let report = self.sync_lines(&db_tx, user_id).await?;
                Ok(CartUpdateReport {
                    items: report.items,
                    failures: Vec::new(),
                })
            } else {
                let mut failures = Vec::new();
                for line in cmd.items.as_deref().unwrap_or_default() {
                    let result = match self
                        .cart_line_for_product(&db_tx, user_id, line.product_id)
                        .await?
                    {
                        Some(existing) => {
                            self.set_line_quantity(&db_tx, existing, line.quantity).await
                        }
                        None => {
                            self.add_line(&db_tx, user_id, line.product_id, line.quantity)
                                .await
                        }
                    };
                    if let Err(error) = result {
                        warn!(%user_id, product_id = %line.product_id, %error,
                            "skipping cart line in batch update");
                        failures.push(CartLineFailure {
                            product_id: line.product_id,
                            error,
                        });
                    }
                }

                let items = self.cart_items_of(&db_tx, user_id).await?;
                Ok(CartUpdateReport { items, failures })
            }
        })
    }

    /// Reconciles every cart line against the live catalog.
    ///
    /// Per line, in order: a line whose product is gone or deactivated is
    /// deleted; a drifted price snapshot is refreshed; a quantity above the
    /// available stock is clamped to `min(stock, 99)`, or the line deleted
    /// when stock is zero. A line that fails unexpectedly while being
    /// processed is deleted rather than left invalid, so the sync is
    /// self-healing but destructive on error.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn sync_cart(&self, user_id: Uuid) -> ResultEngine<CartSyncReport> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.sync_lines(&db_tx, user_id).await
        })
    }

    /// Sum of `unit_price * quantity` over the cart, zero when empty.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn calculate_cart_subtotal(&self, user_id: Uuid) -> ResultEngine<Money> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.subtotal_of(&db_tx, user_id).await
        })
    }

    /// Tax on the cart subtotal. Defaults to 10% when no rate is supplied.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn calculate_cart_tax(
        &self,
        user_id: Uuid,
        tax_rate: Option<TaxRate>,
    ) -> ResultEngine<Money> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let subtotal = self.subtotal_of(&db_tx, user_id).await?;
            Ok(tax_rate.unwrap_or_default().apply(subtotal))
        })
    }

    /// Subtotal plus tax. Defaults to the 10% rate when none is supplied.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn calculate_cart_total(
        &self,
        user_id: Uuid,
        tax_rate: Option<TaxRate>,
    ) -> ResultEngine<Money> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let subtotal = self.subtotal_of(&db_tx, user_id).await?;
            let tax = tax_rate.unwrap_or_default().apply(subtotal);
            subtotal
                .checked_add(tax)
                .ok_or_else(|| EngineError::ProcessingFailure {
                    operation: "cart total",
                    reason: "amount overflow".to_string(),
                })
        })
    }

    /// Read-only audit of the cart against the live catalog.
    ///
    /// Returns the lines [`Engine::sync_cart`] would repair, each with the
    /// reason, without mutating anything. A line with several problems is
    /// reported once, with the most severe one: inactive before out-of-stock
    /// before price drift.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn validate_cart_items(&self, user_id: Uuid) -> ResultEngine<Vec<CartItemIssue>> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            let mut issues = Vec::new();
            for line in self.cart_lines(&db_tx, user_id).await? {
                let item = CartItem::try_from(line)?;
                let product = self.find_product(&db_tx, item.product_id).await?;
                let kind = match product {
                    None => Some(CartIssueKind::Inactive),
                    Some(product) if !product.is_active => Some(CartIssueKind::Inactive),
                    Some(product) if product.stock_quantity < item.quantity => {
                        Some(CartIssueKind::OutOfStock {
                            available: product.stock_quantity,
                        })
                    }
                    Some(product) if product.price_minor != item.unit_price.cents() => {
                        Some(CartIssueKind::PriceDrift {
                            current: Money::new(product.price_minor),
                        })
                    }
                    Some(_) => None,
                };
                if let Some(kind) = kind {
                    issues.push(CartItemIssue { item, kind });
                }
            }
            Ok(issues)
        })
    }

    async fn cart_items_of(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Vec<CartItem>> {
        self.cart_lines(db, user_id)
            .await?
            .into_iter()
            .map(CartItem::try_from)
            .collect()
    }

    async fn delete_cart_lines(&self, db: &DatabaseTransaction, user_id: Uuid) -> ResultEngine<()> {
        cart_items::Entity::delete_many()
            .filter(cart_items::Column::UserId.eq(user_id.to_string()))
            .exec(db)
            .await?;
        Ok(())
    }

    async fn subtotal_of(&self, db: &DatabaseTransaction, user_id: Uuid) -> ResultEngine<Money> {
        let mut subtotal = Money::ZERO;
        for line in self.cart_lines(db, user_id).await? {
            let line_total = Money::new(line.unit_price_minor)
                .checked_mul(i64::from(line.quantity))
                .ok_or_else(|| EngineError::ProcessingFailure {
                    operation: "cart subtotal",
                    reason: "amount overflow".to_string(),
                })?;
            subtotal =
                subtotal
                    .checked_add(line_total)
                    .ok_or_else(|| EngineError::ProcessingFailure {
                        operation: "cart subtotal",
                        reason: "amount overflow".to_string(),
                    })?;
        }
        Ok(subtotal)
    }

    /// Product lookup for a cart write: the product must exist and be active.
    async fn require_sellable_product(
        &self,
        db: &DatabaseTransaction,
        product_id: Uuid,
    ) -> ResultEngine<products::Model> {
        let product = self.require_product(db, product_id).await?;
        if !product.is_active {
            return Err(EngineError::InvalidData {
                field: "product_id",
                reason: format!("product '{product_id}' is not active"),
            });
        }
        Ok(product)
    }

    /// Upsert with **add** semantics: an existing line gains `quantity` on
    /// top of what it holds, a missing line is created with it.
    async fn add_line(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> ResultEngine<CartItem> {
        validate_quantity(quantity)?;
        let product = self.require_sellable_product(db, product_id).await?;

        if let Some(line) = self.cart_line_for_product(db, user_id, product_id).await? {
            let combined = line.quantity.saturating_add(quantity);
            if combined > MAX_QUANTITY {
                return Err(EngineError::InvalidQuantity {
                    quantity: combined,
                    min: MIN_QUANTITY,
                    max: MAX_QUANTITY,
                });
            }
            ensure_stock(&product, product_id, combined)?;

            let active = cart_items::ActiveModel {
                id: ActiveValue::Set(line.id.clone()),
                quantity: ActiveValue::Set(combined),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            let updated = active.update(db).await?;
            return CartItem::try_from(updated);
        }

        let line_count = self.cart_lines(db, user_id).await?.len() as u32;
        if line_count >= MAX_CART_LINES {
            return Err(EngineError::CartLimitReached {
                user_id,
                limit: MAX_CART_LINES,
            });
        }
        ensure_stock(&product, product_id, quantity)?;

        let item = CartItem::new(
            user_id,
            product_id,
            quantity,
            Money::new(product.price_minor),
        );
        cart_items::ActiveModel::from(&item).insert(db).await?;
        Ok(item)
    }

    /// Replaces the quantity of an existing line after re-validating range
    /// and stock.
    async fn set_line_quantity(
        &self,
        db: &DatabaseTransaction,
        line: cart_items::Model,
        quantity: i32,
    ) -> ResultEngine<CartItem> {
        validate_quantity(quantity)?;
        let product_id = util::parse_uuid(&line.product_id, "product_id")?;
        let product = self.require_sellable_product(db, product_id).await?;
        ensure_stock(&product, product_id, quantity)?;

        let active = cart_items::ActiveModel {
            id: ActiveValue::Set(line.id),
            quantity: ActiveValue::Set(quantity),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        let updated = active.update(db).await?;
        CartItem::try_from(updated)
    }

    async fn sync_lines(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<CartSyncReport> {
        let mut actions = Vec::new();
        for line in self.cart_lines(db, user_id).await? {
            let line_id = line.id.clone();
            let product_id = Uuid::parse_str(&line.product_id).unwrap_or_default();
            match self.sync_line(db, line, product_id).await {
                Ok(line_actions) => actions.extend(line_actions),
                Err(error) => {
                    // Self-healing at the cost of the line: never leave a row
                    // we could not verify.
                    warn!(%user_id, %product_id, %error, "dropping cart line that failed to sync");
                    cart_items::Entity::delete_by_id(line_id).exec(db).await?;
                    actions.push(CartSyncAction::Removed {
                        product_id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if !actions.is_empty() {
            debug!(%user_id, repairs = actions.len(), "cart sync applied repairs");
        }

        let items = self.cart_items_of(db, user_id).await?;
        Ok(CartSyncReport { items, actions })
    }

    async fn sync_line(
        &self,
        db: &DatabaseTransaction,
        line: cart_items::Model,
        product_id: Uuid,
    ) -> ResultEngine<Vec<CartSyncAction>> {
        if product_id.is_nil() {
            return Err(EngineError::InvalidData {
                field: "product_id",
                reason: format!("'{}' is not a valid id", line.product_id),
            });
        }

        let mut actions = Vec::new();

        let product = match self.find_product(db, product_id).await? {
            Some(product) if product.is_active => product,
            _ => {
                cart_items::Entity::delete_by_id(line.id).exec(db).await?;
                actions.push(CartSyncAction::Removed {
                    product_id,
                    reason: "product is no longer available".to_string(),
                });
                return Ok(actions);
            }
        };

        let mut quantity = line.quantity;
        let mut unit_price_minor = line.unit_price_minor;

        if product.price_minor != unit_price_minor {
            actions.push(CartSyncAction::Repriced {
                product_id,
                from: Money::new(unit_price_minor),
                to: Money::new(product.price_minor),
            });
            unit_price_minor = product.price_minor;
        }

        if quantity > product.stock_quantity {
            if product.stock_quantity > 0 {
                let clamped = product.stock_quantity.min(MAX_QUANTITY);
                actions.push(CartSyncAction::Clamped {
                    product_id,
                    from: quantity,
                    to: clamped,
                });
                quantity = clamped;
            } else {
                cart_items::Entity::delete_by_id(line.id).exec(db).await?;
                actions.push(CartSyncAction::Removed {
                    product_id,
                    reason: "product is out of stock".to_string(),
                });
                return Ok(actions);
            }
        }

        if quantity != line.quantity || unit_price_minor != line.unit_price_minor {
            let active = cart_items::ActiveModel {
                id: ActiveValue::Set(line.id),
                quantity: ActiveValue::Set(quantity),
                unit_price_minor: ActiveValue::Set(unit_price_minor),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(db).await?;
        }

        Ok(actions)
    }
}
