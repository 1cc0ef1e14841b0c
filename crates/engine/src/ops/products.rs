use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    CreateProductCmd, EngineError, Money, Product, ResultEngine, UpdateProductCmd, products,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

/// Filters for listing products.
#[derive(Clone, Debug, Default)]
pub struct ProductListFilter {
    /// If present, only products assigned to this category.
    pub category_id: Option<Uuid>,
    /// If true, includes deactivated products (default: false).
    pub include_inactive: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProductsCursor {
    created_at: DateTime<Utc>,
    product_id: String,
}

impl ProductsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid products cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid products cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid products cursor".to_string()))
    }
}

fn validate_price(price: Money) -> ResultEngine<()> {
    if price.is_negative() {
        return Err(EngineError::InvalidData {
            field: "price",
            reason: format!("price must not be negative, got {price}"),
        });
    }
    Ok(())
}

fn validate_stock(stock_quantity: i32) -> ResultEngine<()> {
    if stock_quantity < 0 {
        return Err(EngineError::InvalidData {
            field: "stock_quantity",
            reason: format!("stock must not be negative, got {stock_quantity}"),
        });
    }
    Ok(())
}

impl Engine {
    /// Creates a catalog product and returns its id.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidData`] if the name or SKU is blank, or price or
    ///   stock is negative
    /// - [`EngineError::AlreadyExists`] if another product uses the same SKU
    /// - [`EngineError::NotFound`] if the requested category does not exist
    pub async fn create_product(&self, cmd: CreateProductCmd) -> ResultEngine<Uuid> {
        let name = normalize_required_name(&cmd.name, "name")?;
        let sku = normalize_required_name(&cmd.sku, "sku")?;
        let description = normalize_optional_text(cmd.description.as_deref());
        validate_price(cmd.price)?;
        validate_stock(cmd.stock_quantity)?;

        with_tx!(self, |db_tx| {
            if let Some(category_id) = cmd.category_id {
                self.require_category(&db_tx, category_id).await?;
            }

            let taken = products::Entity::find()
                .filter(Expr::cust("LOWER(sku)").eq(sku.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if taken {
                return Err(EngineError::AlreadyExists {
                    entity: "product",
                    field: "sku",
                    value: sku,
                });
            }

            let product = Product::new(
                name,
                sku,
                description,
                cmd.price,
                cmd.stock_quantity,
                cmd.category_id,
            );
            let product_id = product.id;
            products::ActiveModel::from(&product).insert(&db_tx).await?;
            Ok(product_id)
        })
    }

    /// Fetches a product by id.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such product exists.
    pub async fn product(&self, product_id: Uuid) -> ResultEngine<Product> {
        with_tx!(self, |db_tx| {
            let model = self.require_product(&db_tx, product_id).await?;
            Product::try_from(model)
        })
    }

    /// Fetches a product by SKU, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no product uses this SKU.
    pub async fn product_by_sku(&self, sku: &str) -> ResultEngine<Product> {
        let sku = sku.trim().to_string();
        with_tx!(self, |db_tx| {
            let model = products::Entity::find()
                .filter(Expr::cust("LOWER(sku)").eq(sku.to_lowercase()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "product",
                    id: sku.clone(),
                })?;
            Product::try_from(model)
        })
    }

    /// Patches name, description and price. `None` fields stay unchanged; an
    /// empty description clears the stored one.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such product exists.
    pub async fn update_product(
        &self,
        product_id: Uuid,
        cmd: UpdateProductCmd,
    ) -> ResultEngine<()> {
        let name = cmd
            .name
            .as_deref()
            .map(|raw| normalize_required_name(raw, "name"))
            .transpose()?;
        if let Some(price) = cmd.price {
            validate_price(price)?;
        }

        with_tx!(self, |db_tx| {
            self.require_product(&db_tx, product_id).await?;

            let mut active = products::ActiveModel {
                id: ActiveValue::Set(product_id.to_string()),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(description) = cmd.description.as_deref() {
                active.description = ActiveValue::Set(normalize_optional_text(Some(description)));
            }
            if let Some(price) = cmd.price {
                active.price_minor = ActiveValue::Set(price.cents());
            }
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Activates or deactivates a product. Idempotent.
    ///
    /// Deactivated products stay visible through [`Engine::product`] but are
    /// rejected by cart writes and removed by the next cart sync.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such product exists.
    pub async fn set_product_active(&self, product_id: Uuid, active: bool) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_product(&db_tx, product_id).await?;
            let model = products::ActiveModel {
                id: ActiveValue::Set(product_id.to_string()),
                is_active: ActiveValue::Set(active),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            model.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Sets the absolute stock level.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such product exists
    /// - [`EngineError::InvalidData`] if `stock_quantity` is negative
    pub async fn set_product_stock(
        &self,
        product_id: Uuid,
        stock_quantity: i32,
    ) -> ResultEngine<()> {
        validate_stock(stock_quantity)?;
        with_tx!(self, |db_tx| {
            self.require_product(&db_tx, product_id).await?;
            let model = products::ActiveModel {
                id: ActiveValue::Set(product_id.to_string()),
                stock_quantity: ActiveValue::Set(stock_quantity),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            model.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Adjusts the stock level by a signed delta and returns the new level.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such product exists
    /// - [`EngineError::InsufficientStock`] if the delta would take the level
    ///   below zero
    pub async fn adjust_product_stock(&self, product_id: Uuid, delta: i32) -> ResultEngine<i32> {
        with_tx!(self, |db_tx| {
            let model = self.require_product(&db_tx, product_id).await?;
            let new_level = model.stock_quantity.saturating_add(delta);
            if new_level < 0 {
                return Err(EngineError::InsufficientStock {
                    product_id,
                    requested: -delta,
                    available: model.stock_quantity,
                });
            }
            let active = products::ActiveModel {
                id: ActiveValue::Set(product_id.to_string()),
                stock_quantity: ActiveValue::Set(new_level),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(new_level)
        })
    }

    /// Assigns the product to a category, or detaches it with `None`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the product or the category does not
    /// exist.
    pub async fn set_product_category(
        &self,
        product_id: Uuid,
        category_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_product(&db_tx, product_id).await?;
            if let Some(category_id) = category_id {
                self.require_category(&db_tx, category_id).await?;
            }
            let model = products::ActiveModel {
                id: ActiveValue::Set(product_id.to_string()),
                category_id: ActiveValue::Set(category_id.map(|id| id.to_string())),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            model.update(&db_tx).await?;
            Ok(())
        })
    }

    /// `true` if the live stock level covers `quantity`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such product exists.
    pub async fn has_enough_stock(&self, product_id: Uuid, quantity: i32) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let model = self.require_product(&db_tx, product_id).await?;
            Ok(model.stock_quantity >= quantity)
        })
    }

    /// Live stock level of a product.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such product exists.
    pub async fn stock_quantity(&self, product_id: Uuid) -> ResultEngine<i32> {
        with_tx!(self, |db_tx| {
            let model = self.require_product(&db_tx, product_id).await?;
            Ok(model.stock_quantity)
        })
    }

    /// Lists products with cursor-based pagination, newest first by
    /// `(created_at DESC, id DESC)`.
    ///
    /// Returns the page and, when more rows exist, an opaque cursor for the
    /// next one.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidCursor`] if the cursor is malformed.
    pub async fn list_products_page(
        &self,
        limit: u64,
        cursor: Option<&str>,
        filter: &ProductListFilter,
    ) -> ResultEngine<(Vec<Product>, Option<String>)> {
        with_tx!(self, |db_tx| {
            let limit_plus_one = limit.saturating_add(1);
            let mut query = products::Entity::find()
                .order_by_desc(products::Column::CreatedAt)
                .order_by_desc(products::Column::Id)
                .limit(limit_plus_one);

            if let Some(category_id) = filter.category_id {
                query = query.filter(products::Column::CategoryId.eq(category_id.to_string()));
            }
            if !filter.include_inactive {
                query = query.filter(products::Column::IsActive.eq(true));
            }
            if let Some(cursor) = cursor {
                let cursor = ProductsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(products::Column::CreatedAt.lt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(products::Column::CreatedAt.eq(cursor.created_at))
                                .add(products::Column::Id.lt(cursor.product_id)),
                        ),
                );
            }

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Product> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Product::try_from(model)?);
            }

            let next_cursor = if has_more {
                out.last()
                    .map(|product| {
                        ProductsCursor {
                            created_at: product.created_at,
                            product_id: product.id.to_string(),
                        }
                        .encode()
                    })
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
