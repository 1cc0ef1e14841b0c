use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, cart_items, categories, orders, products, users};

use super::Engine;

/// Generates `find_*` and `require_*` lookup methods for an entity keyed by
/// UUID.
macro_rules! impl_entity_lookup {
    ($find_fn:ident, $require_fn:ident, $module:ident, $label:literal) => {
        pub(super) async fn $find_fn(
            &self,
            db: &DatabaseTransaction,
            id: Uuid,
        ) -> ResultEngine<Option<$module::Model>> {
            $module::Entity::find_by_id(id.to_string())
                .one(db)
                .await
                .map_err(Into::into)
        }

        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            id: Uuid,
        ) -> ResultEngine<$module::Model> {
            self.$find_fn(db, id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: $label,
                    id: id.to_string(),
                })
        }
    };
}

impl Engine {
    impl_entity_lookup!(find_user, require_user, users, "user");
    impl_entity_lookup!(find_product, require_product, products, "product");
    impl_entity_lookup!(find_category, require_category, categories, "category");
    impl_entity_lookup!(find_cart_item, require_cart_item, cart_items, "cart item");
    impl_entity_lookup!(find_order, require_order, orders, "order");

    /// Cart line by id, verified to belong to `user_id`.
    pub(super) async fn require_cart_item_owned(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        cart_item_id: Uuid,
    ) -> ResultEngine<cart_items::Model> {
        let model = self.require_cart_item(db, cart_item_id).await?;
        if model.user_id != user_id.to_string() {
            return Err(EngineError::OwnershipDenied {
                entity: "cart item",
                id: cart_item_id,
                user_id,
            });
        }
        Ok(model)
    }

    /// Order by id, verified to belong to `user_id`.
    pub(super) async fn require_order_owned(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        order_id: Uuid,
    ) -> ResultEngine<orders::Model> {
        let model = self.require_order(db, order_id).await?;
        if model.user_id != user_id.to_string() {
            return Err(EngineError::OwnershipDenied {
                entity: "order",
                id: order_id,
                user_id,
            });
        }
        Ok(model)
    }

    /// All cart lines for a user, oldest first.
    pub(super) async fn cart_lines(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Vec<cart_items::Model>> {
        cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(cart_items::Column::CreatedAt)
            .order_by_asc(cart_items::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// Cart line for a (user, product) pair, if present.
    pub(super) async fn cart_line_for_product(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        product_id: Uuid,
    ) -> ResultEngine<Option<cart_items::Model>> {
        cart_items::Entity::find()
            .filter(cart_items::Column::UserId.eq(user_id.to_string()))
            .filter(cart_items::Column::ProductId.eq(product_id.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Direct children of a category, reorder-stable: `(sort_order, name)`.
    pub(super) async fn child_categories(
        &self,
        db: &DatabaseTransaction,
        parent_id: Option<Uuid>,
    ) -> ResultEngine<Vec<categories::Model>> {
        let mut query = categories::Entity::find();
        query = match parent_id {
            Some(parent_id) => {
                query.filter(categories::Column::ParentId.eq(parent_id.to_string()))
            }
            None => query.filter(categories::Column::ParentId.is_null()),
        };
        query
            .order_by_asc(categories::Column::SortOrder)
            .order_by_asc(categories::Column::Name)
            .all(db)
            .await
            .map_err(Into::into)
    }
}
