use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CheckoutCmd, EngineError, Money, Order, OrderItem, OrderStatus, OrderTotals, ResultEngine,
    cart_items, order_items, orders, products, util,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

fn overflow(operation: &'static str) -> EngineError {
    EngineError::ProcessingFailure {
        operation,
        reason: "amount overflow".to_string(),
    }
}

impl Engine {
    /// Converts the cart into an order and clears the cart.
    ///
    /// Every line is re-validated against the live catalog first, and unlike
    /// [`Engine::sync_cart`] this is strict: an inactive product, missing
    /// stock or a drifted price is a hard failure naming the product, so an
    /// order is never created with different quantities or prices than the
    /// caller last saw. Callers are expected to sync the cart and re-present
    /// it on failure. Sold quantities are subtracted from product stock.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidData`] if the cart is empty, shipping fields
    ///   are blank, a product is no longer available, a price drifted, or the
    ///   discount exceeds the order total
    /// - [`EngineError::InsufficientStock`] if live stock cannot cover a line
    /// - [`EngineError::NotFound`] if the user does not exist
    pub async fn checkout(&self, user_id: Uuid, cmd: CheckoutCmd) -> ResultEngine<Order> {
        let shipping_name = normalize_required_name(&cmd.shipping_name, "shipping_name")?;
        let shipping_address = normalize_required_name(&cmd.shipping_address, "shipping_address")?;
        let notes = normalize_optional_text(cmd.notes.as_deref());
        if cmd.shipping_fee.is_negative() {
            return Err(EngineError::InvalidData {
                field: "shipping_fee",
                reason: format!("must not be negative, got {}", cmd.shipping_fee),
            });
        }
        if cmd.discount.is_negative() {
            return Err(EngineError::InvalidData {
                field: "discount",
                reason: format!("must not be negative, got {}", cmd.discount),
            });
        }

        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            let lines = self.cart_lines(&db_tx, user_id).await?;
            if lines.is_empty() {
                return Err(EngineError::InvalidData {
                    field: "cart",
                    reason: "cart is empty".to_string(),
                });
            }

            let mut checked: Vec<(cart_items::Model, products::Model)> =
                Vec::with_capacity(lines.len());
            let mut subtotal = Money::ZERO;
            for line in lines {
                let product_id = util::parse_uuid(&line.product_id, "product_id")?;
                let product = self.require_product(&db_tx, product_id).await?;
                if !product.is_active {
                    return Err(EngineError::InvalidData {
                        field: "product_id",
                        reason: format!("product '{product_id}' is no longer available"),
                    });
                }
                if product.stock_quantity < line.quantity {
                    return Err(EngineError::InsufficientStock {
                        product_id,
                        requested: line.quantity,
                        available: product.stock_quantity,
                    });
                }
                if product.price_minor != line.unit_price_minor {
                    return Err(EngineError::InvalidData {
                        field: "unit_price",
                        reason: format!(
                            "price of product '{product_id}' changed; sync the cart and retry"
                        ),
                    });
                }

                let line_total = Money::new(line.unit_price_minor)
                    .checked_mul(i64::from(line.quantity))
                    .ok_or_else(|| overflow("checkout"))?;
                subtotal = subtotal
                    .checked_add(line_total)
                    .ok_or_else(|| overflow("checkout"))?;
                checked.push((line, product));
            }

            let tax = cmd.tax_rate.unwrap_or_default().apply(subtotal);
            let total = subtotal
                .checked_add(tax)
                .and_then(|v| v.checked_add(cmd.shipping_fee))
                .and_then(|v| v.checked_sub(cmd.discount))
                .ok_or_else(|| overflow("checkout"))?;
            if total.is_negative() {
                return Err(EngineError::InvalidData {
                    field: "discount",
                    reason: format!("discount {} exceeds the order total", cmd.discount),
                });
            }

            let mut order = Order::new(
                user_id,
                shipping_name,
                shipping_address,
                cmd.payment_method,
                OrderTotals {
                    subtotal,
                    tax,
                    shipping_fee: cmd.shipping_fee,
                    discount: cmd.discount,
                    total,
                },
                notes,
            );
            orders::ActiveModel::from(&order).insert(&db_tx).await?;

            for (line, product) in checked {
                let item = OrderItem::new(
                    order.id,
                    util::parse_uuid(&product.id, "product_id")?,
                    product.name.clone(),
                    product.sku.clone(),
                    line.quantity,
                    Money::new(line.unit_price_minor),
                );
                order_items::ActiveModel::from(&item).insert(&db_tx).await?;
                order.items.push(item);

                let stock = products::ActiveModel {
                    id: ActiveValue::Set(product.id),
                    stock_quantity: ActiveValue::Set(product.stock_quantity - line.quantity),
                    updated_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                };
                stock.update(&db_tx).await?;
            }

            cart_items::Entity::delete_many()
                .filter(cart_items::Column::UserId.eq(user_id.to_string()))
                .exec(&db_tx)
                .await?;

            Ok(order)
        })
    }

    /// Fetches an order with its lines.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such order exists
    /// - [`EngineError::OwnershipDenied`] if it belongs to another user
    pub async fn order(&self, user_id: Uuid, order_id: Uuid) -> ResultEngine<Order> {
        with_tx!(self, |db_tx| {
            let model = self.require_order_owned(&db_tx, user_id, order_id).await?;
            let mut order = Order::try_from(model)?;
            order.items = order_items::Entity::find()
                .filter(order_items::Column::OrderId.eq(order_id.to_string()))
                .order_by_asc(order_items::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(OrderItem::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;
            Ok(order)
        })
    }

    /// Lists a user's orders with their lines, newest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such user exists.
    pub async fn list_orders(&self, user_id: Uuid) -> ResultEngine<Vec<Order>> {
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            let rows = orders::Entity::find()
                .filter(orders::Column::UserId.eq(user_id.to_string()))
                .order_by_desc(orders::Column::CreatedAt)
                .order_by_desc(orders::Column::Id)
                .find_with_related(order_items::Entity)
                .all(&db_tx)
                .await?;

            let mut out = Vec::with_capacity(rows.len());
            for (order_model, item_models) in rows {
                let mut order = Order::try_from(order_model)?;
                order.items = item_models
                    .into_iter()
                    .map(OrderItem::try_from)
                    .collect::<ResultEngine<Vec<_>>>()?;
                out.push(order);
            }
            Ok(out)
        })
    }

    /// Moves an order to a new status.
    ///
    /// `Delivered` and `Cancelled` are terminal: once an order reaches one of
    /// them its status can no longer change.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such order exists
    /// - [`EngineError::OwnershipDenied`] if it belongs to another user
    /// - [`EngineError::InvalidData`] if the current status is terminal
    pub async fn update_order_status(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        status: OrderStatus,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_order_owned(&db_tx, user_id, order_id).await?;
            let current = OrderStatus::try_from(model.status.as_str())?;
            if current.is_terminal() {
                return Err(EngineError::InvalidData {
                    field: "status",
                    reason: format!("order status '{}' is terminal", current.as_str()),
                });
            }
            let active = orders::ActiveModel {
                id: ActiveValue::Set(order_id.to_string()),
                status: ActiveValue::Set(status.as_str().to_string()),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Sets or clears the shipment tracking number.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such order exists
    /// - [`EngineError::OwnershipDenied`] if it belongs to another user
    pub async fn set_order_tracking(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        tracking_number: Option<&str>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_order_owned(&db_tx, user_id, order_id).await?;
            let active = orders::ActiveModel {
                id: ActiveValue::Set(order_id.to_string()),
                tracking_number: ActiveValue::Set(normalize_optional_text(tracking_number)),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Sets or clears the free-form order notes.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such order exists
    /// - [`EngineError::OwnershipDenied`] if it belongs to another user
    pub async fn set_order_notes(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        notes: Option<&str>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_order_owned(&db_tx, user_id, order_id).await?;
            let active = orders::ActiveModel {
                id: ActiveValue::Set(order_id.to_string()),
                notes: ActiveValue::Set(normalize_optional_text(notes)),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }
}
