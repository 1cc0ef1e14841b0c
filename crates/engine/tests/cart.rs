use sea_orm::Database;
use uuid::Uuid;

use engine::{
    CartIssueKind, CartItem, CartLine, CartSyncAction, CreateProductCmd, CreateUserCmd, Engine,
    EngineError, Money, TaxRate, UpdateCartCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn shopper(engine: &Engine, email: &str) -> Uuid {
    engine
        .create_user(CreateUserCmd::new(email, "secret", "Shopper"))
        .await
        .unwrap()
}

async fn product(engine: &Engine, sku: &str, price: Money, stock: i32) -> Uuid {
    engine
        .create_product(CreateProductCmd::new(format!("Product {sku}"), sku, price).stock_quantity(stock))
        .await
        .unwrap()
}

#[tokio::test]
async fn add_item_creates_single_line_with_price_snapshot() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;

    let item = engine.add_item_to_cart(user, gadget, 3).await.unwrap();
    assert_eq!(item.quantity, 3);
    assert_eq!(item.unit_price, Money::new(20_00));

    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].product_id, gadget);

    let subtotal = engine.calculate_cart_subtotal(user).await.unwrap();
    assert_eq!(subtotal, Money::new(60_00));
}

#[tokio::test]
async fn add_item_for_same_product_accumulates_quantity() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;

    engine.add_item_to_cart(user, gadget, 3).await.unwrap();
    let item = engine.add_item_to_cart(user, gadget, 5).await.unwrap();

    assert_eq!(item.quantity, 8);
    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart.len(), 1, "no second line for the same product");
    assert_eq!(cart[0].quantity, 8);
}

#[tokio::test]
async fn add_item_validates_quantity_stock_and_existence() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 5).await;

    let err = engine.add_item_to_cart(user, gadget, 0).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidQuantity {
            quantity: 0,
            min: 1,
            max: 99
        }
    );

    let err = engine.add_item_to_cart(user, gadget, 100).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity { quantity: 100, .. }));

    let err = engine.add_item_to_cart(user, gadget, 6).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientStock {
            product_id: gadget,
            requested: 6,
            available: 5
        }
    );

    let ghost = Uuid::new_v4();
    let err = engine.add_item_to_cart(user, ghost, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "product", .. }));

    let err = engine.add_item_to_cart(Uuid::new_v4(), gadget, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn combined_quantity_failures_are_reported_distinctly() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    // Plenty of stock so only the per-item cap can trip.
    let capped = product(&engine, "CAP-1", Money::new(1_00), 500).await;
    engine.add_item_to_cart(user, capped, 60).await.unwrap();
    let err = engine.add_item_to_cart(user, capped, 40).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidQuantity {
            quantity: 100,
            min: 1,
            max: 99
        }
    );

    // Low stock so the stock check trips before the cap.
    let scarce = product(&engine, "SCR-1", Money::new(1_00), 8).await;
    engine.add_item_to_cart(user, scarce, 5).await.unwrap();
    let err = engine.add_item_to_cart(user, scarce, 5).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientStock {
            product_id: scarce,
            requested: 10,
            available: 8
        }
    );
}

#[tokio::test]
async fn distinct_line_cap_blocks_new_lines_but_not_updates() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;

    let mut first = None;
    for i in 0..50 {
        let id = product(&engine, &format!("SKU-{i:03}"), Money::new(5_00), 100).await;
        engine.add_item_to_cart(user, id, 1).await.unwrap();
        first.get_or_insert(id);
    }

    let overflow = product(&engine, "SKU-OVF", Money::new(5_00), 100).await;
    let err = engine.add_item_to_cart(user, overflow, 1).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::CartLimitReached {
            user_id: user,
            limit: 50
        }
    );

    // Raising the quantity of an existing line does not count against the cap.
    let item = engine
        .add_item_to_cart(user, first.unwrap(), 2)
        .await
        .unwrap();
    assert_eq!(item.quantity, 3);
}

#[tokio::test]
async fn update_quantity_replaces_and_checks_ownership() {
    let engine = engine_with_db().await;
    let alice = shopper(&engine, "alice@example.com").await;
    let mallory = shopper(&engine, "mallory@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;

    let item = engine.add_item_to_cart(alice, gadget, 3).await.unwrap();

    let updated = engine
        .update_cart_item_quantity(alice, item.id, 7)
        .await
        .unwrap();
    assert_eq!(updated.quantity, 7, "replace, not add");

    let err = engine
        .update_cart_item_quantity(mallory, item.id, 1)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::OwnershipDenied {
            entity: "cart item",
            id: item.id,
            user_id: mallory
        }
    );

    let err = engine
        .update_cart_item_quantity(alice, item.id, 11)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { .. }));
}

#[tokio::test]
async fn removal_variants_and_clear() {
    let engine = engine_with_db().await;
    let alice = shopper(&engine, "alice@example.com").await;
    let mallory = shopper(&engine, "mallory@example.com").await;
    let a = product(&engine, "SKU-A", Money::new(1_00), 10).await;
    let b = product(&engine, "SKU-B", Money::new(2_00), 10).await;

    let line_a = engine.add_item_to_cart(alice, a, 1).await.unwrap();
    engine.add_item_to_cart(alice, b, 1).await.unwrap();

    let err = engine.remove_cart_item(mallory, line_a.id).await.unwrap_err();
    assert!(matches!(err, EngineError::OwnershipDenied { .. }));

    engine.remove_cart_item(alice, line_a.id).await.unwrap();
    assert_eq!(engine.cart(alice).await.unwrap().len(), 1);

    // Product-keyed removal fails distinctly when the product never was in
    // the cart.
    let err = engine.remove_product_from_cart(alice, a).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "cart item", .. }));

    engine.remove_product_from_cart(alice, b).await.unwrap();
    assert!(engine.cart(alice).await.unwrap().is_empty());

    engine.add_item_to_cart(alice, a, 1).await.unwrap();
    engine.clear_cart(alice).await.unwrap();
    assert!(engine.cart(alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn totals_use_default_rate_when_none_given() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(19_99), 10).await;
    engine.add_item_to_cart(user, gadget, 2).await.unwrap();

    let subtotal = engine.calculate_cart_subtotal(user).await.unwrap();
    assert_eq!(subtotal, Money::new(39_98));

    // The subtotal is the sum of the per-line totals.
    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart[0].line_total(), Some(Money::new(39_98)));
    let absurd = CartItem::new(user, gadget, 99, Money::new(i64::MAX));
    assert_eq!(absurd.line_total(), None, "overflow is not silent");

    let tax = engine.calculate_cart_tax(user, None).await.unwrap();
    assert_eq!(tax, Money::new(4_00), "10% of 39.98 rounds half-up");

    let total = engine.calculate_cart_total(user, None).await.unwrap();
    assert_eq!(total, Money::new(43_98));

    let rate = TaxRate::from_basis_points(2000).unwrap();
    let total = engine.calculate_cart_total(user, Some(rate)).await.unwrap();
    assert_eq!(total, Money::new(47_98));

    // Empty cart defaults to zero everywhere.
    engine.clear_cart(user).await.unwrap();
    assert_eq!(
        engine.calculate_cart_total(user, None).await.unwrap(),
        Money::ZERO
    );
}

#[tokio::test]
async fn sync_clamps_quantity_to_live_stock() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    engine.add_item_to_cart(user, gadget, 8).await.unwrap();

    engine.set_product_stock(gadget, 3).await.unwrap();

    let report = engine.sync_cart(user).await.unwrap();
    assert_eq!(
        report.actions,
        vec![CartSyncAction::Clamped {
            product_id: gadget,
            from: 8,
            to: 3
        }]
    );
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].quantity, 3);
}

#[tokio::test]
async fn sync_removes_lines_for_inactive_or_sold_out_products() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gone = product(&engine, "SKU-GONE", Money::new(5_00), 10).await;
    let dry = product(&engine, "SKU-DRY", Money::new(5_00), 10).await;
    let fine = product(&engine, "SKU-FINE", Money::new(5_00), 10).await;
    engine.add_item_to_cart(user, gone, 1).await.unwrap();
    engine.add_item_to_cart(user, dry, 2).await.unwrap();
    engine.add_item_to_cart(user, fine, 3).await.unwrap();

    engine.set_product_active(gone, false).await.unwrap();
    engine.set_product_stock(dry, 0).await.unwrap();

    let report = engine.sync_cart(user).await.unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].product_id, fine);
    assert!(report.actions.contains(&CartSyncAction::Removed {
        product_id: gone,
        reason: "product is no longer available".to_string()
    }));
    assert!(report.actions.contains(&CartSyncAction::Removed {
        product_id: dry,
        reason: "product is out of stock".to_string()
    }));
}

#[tokio::test]
async fn sync_refreshes_drifted_price_snapshot() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    engine.add_item_to_cart(user, gadget, 2).await.unwrap();

    engine
        .update_product(gadget, engine::UpdateProductCmd::new().price(Money::new(25_00)))
        .await
        .unwrap();

    // The snapshot holds until the next sync.
    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart[0].unit_price, Money::new(20_00));

    let report = engine.sync_cart(user).await.unwrap();
    assert_eq!(
        report.actions,
        vec![CartSyncAction::Repriced {
            product_id: gadget,
            from: Money::new(20_00),
            to: Money::new(25_00)
        }]
    );
    assert_eq!(report.items[0].unit_price, Money::new(25_00));
    assert_eq!(
        engine.calculate_cart_subtotal(user).await.unwrap(),
        Money::new(50_00)
    );
}

#[tokio::test]
async fn validate_cart_items_flags_without_mutating() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gone = product(&engine, "SKU-GONE", Money::new(5_00), 10).await;
    let dry = product(&engine, "SKU-DRY", Money::new(5_00), 10).await;
    let drifted = product(&engine, "SKU-DRIFT", Money::new(5_00), 10).await;
    let fine = product(&engine, "SKU-FINE", Money::new(5_00), 10).await;
    for id in [gone, dry, drifted, fine] {
        engine.add_item_to_cart(user, id, 4).await.unwrap();
    }

    engine.set_product_active(gone, false).await.unwrap();
    engine.set_product_stock(dry, 1).await.unwrap();
    engine
        .update_product(drifted, engine::UpdateProductCmd::new().price(Money::new(6_00)))
        .await
        .unwrap();

    let issues = engine.validate_cart_items(user).await.unwrap();
    assert_eq!(issues.len(), 3);
    let kind_for = |id: Uuid| {
        issues
            .iter()
            .find(|issue| issue.item.product_id == id)
            .map(|issue| issue.kind.clone())
    };
    assert_eq!(kind_for(gone), Some(CartIssueKind::Inactive));
    assert_eq!(kind_for(dry), Some(CartIssueKind::OutOfStock { available: 1 }));
    assert_eq!(
        kind_for(drifted),
        Some(CartIssueKind::PriceDrift {
            current: Money::new(6_00)
        })
    );
    assert_eq!(kind_for(fine), None);

    // Read-only: the audit changed nothing.
    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart.len(), 4);
    assert!(cart.iter().all(|item| item.quantity == 4));
}

#[tokio::test]
async fn update_cart_clear_wins_over_other_directives() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    engine.add_item_to_cart(user, gadget, 2).await.unwrap();

    let cmd = UpdateCartCmd::new()
        .clear()
        .sync()
        .items(vec![CartLine::new(gadget, 5)]);
    let report = engine.update_cart(user, cmd).await.unwrap();
    assert!(report.items.is_empty());
    assert!(report.failures.is_empty());
    assert!(engine.cart(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_cart_sync_directive_delegates_to_sync() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    engine.add_item_to_cart(user, gadget, 8).await.unwrap();
    engine.set_product_stock(gadget, 3).await.unwrap();

    let report = engine
        .update_cart(user, UpdateCartCmd::new().sync())
        .await
        .unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].quantity, 3);

    // The repair was committed, not just reported.
    let cart = engine.cart(user).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 3, "clamp must survive the transaction");
}

#[tokio::test]
async fn update_cart_items_is_best_effort_never_atomic() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    let scarce = product(&engine, "SCR-1", Money::new(5_00), 2).await;
    engine.add_item_to_cart(user, gadget, 2).await.unwrap();

    let ghost = Uuid::new_v4();
    let cmd = UpdateCartCmd::new().items(vec![
        CartLine::new(gadget, 5),  // replace 2 -> 5
        CartLine::new(ghost, 1),   // unknown product: skipped
        CartLine::new(scarce, 10), // over stock: skipped
    ]);
    let report = engine.update_cart(user, cmd).await.unwrap();

    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|failure| {
        failure.product_id == ghost
            && matches!(failure.error, EngineError::NotFound { entity: "product", .. })
    }));
    assert!(report.failures.iter().any(|failure| {
        failure.product_id == scarce
            && matches!(failure.error, EngineError::InsufficientStock { .. })
    }));

    // The batch applied whatever subset succeeded; items use replace
    // semantics for lines already in the cart.
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].product_id, gadget);
    assert_eq!(report.items[0].quantity, 5);
}
