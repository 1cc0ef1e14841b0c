use sea_orm::Database;
use uuid::Uuid;

use engine::{
    CheckoutCmd, CreateProductCmd, CreateUserCmd, Engine, EngineError, Money, OrderStatus,
    PaymentMethod, TaxRate, UpdateProductCmd,
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

fn checkout_cmd() -> CheckoutCmd {
    CheckoutCmd::new("Alice Smith", "1 Main St, Springfield", PaymentMethod::CreditCard)
}

#[tokio::test]
async fn checkout_freezes_cart_into_order_and_clears_it() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(20_00), 10).await;
    let widget = product(&engine, "WID-7", Money::new(5_50), 10).await;
    engine.add_item_to_cart(user, gadget, 3).await.unwrap();
    engine.add_item_to_cart(user, widget, 2).await.unwrap();

    let cmd = checkout_cmd()
        .shipping_fee(Money::new(5_00))
        .discount(Money::new(1_00))
        .notes("ring the bell");
    let order = engine.checkout(user, cmd).await.unwrap();

    // subtotal 71.00, default 10% tax 7.10, +5.00 shipping, -1.00 discount
    assert_eq!(order.subtotal, Money::new(71_00));
    assert_eq!(order.tax, Money::new(7_10));
    assert_eq!(order.shipping_fee, Money::new(5_00));
    assert_eq!(order.discount, Money::new(1_00));
    assert_eq!(order.total, Money::new(82_10));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.notes.as_deref(), Some("ring the bell"));

    // The cart is gone and stock was decremented.
    assert!(engine.cart(user).await.unwrap().is_empty());
    assert_eq!(engine.stock_quantity(gadget).await.unwrap(), 7);
    assert_eq!(engine.stock_quantity(widget).await.unwrap(), 8);

    // Order lines are frozen snapshots: later catalog edits change nothing.
    engine
        .update_product(
            gadget,
            UpdateProductCmd::new().name("Renamed").price(Money::new(99_00)),
        )
        .await
        .unwrap();
    let reloaded = engine.order(user, order.id).await.unwrap();
    assert_eq!(reloaded.total, Money::new(82_10));
    let line = reloaded
        .items
        .iter()
        .find(|item| item.product_id == gadget)
        .unwrap();
    assert_eq!(line.product_name, "Product GAD-42");
    assert_eq!(line.unit_price, Money::new(20_00));
    assert_eq!(line.line_total, Money::new(60_00));
}

#[tokio::test]
async fn checkout_honors_explicit_tax_rate() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(10_00), 10).await;
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();

    let rate = TaxRate::from_basis_points(825).unwrap();
    let order = engine.checkout(user, checkout_cmd().tax_rate(rate)).await.unwrap();
    assert_eq!(order.tax, Money::new(83), "8.25% of 10.00, rounded half-up");
    assert_eq!(order.total, Money::new(10_83));
}

#[tokio::test]
async fn checkout_rejects_empty_cart_and_bad_amounts() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;

    let err = engine.checkout(user, checkout_cmd()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "cart", .. }));

    let gadget = product(&engine, "GAD-42", Money::new(10_00), 10).await;
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();

    let err = engine
        .checkout(user, checkout_cmd().discount(Money::new(-1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "discount", .. }));

    let err = engine
        .checkout(user, checkout_cmd().discount(Money::new(100_00)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "discount", .. }));

    let err = engine
        .checkout(user, CheckoutCmd::new("", "addr", PaymentMethod::Paypal))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "shipping_name", .. }));

    // Nothing above consumed the cart.
    assert_eq!(engine.cart(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_is_strict_about_catalog_drift() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(10_00), 10).await;
    engine.add_item_to_cart(user, gadget, 4).await.unwrap();

    engine.set_product_stock(gadget, 3).await.unwrap();
    let err = engine.checkout(user, checkout_cmd()).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientStock {
            product_id: gadget,
            requested: 4,
            available: 3
        }
    );

    engine.set_product_stock(gadget, 10).await.unwrap();
    engine
        .update_product(gadget, UpdateProductCmd::new().price(Money::new(12_00)))
        .await
        .unwrap();
    let err = engine.checkout(user, checkout_cmd()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "unit_price", .. }));

    // A sync repairs the cart, after which checkout goes through.
    engine.sync_cart(user).await.unwrap();
    let order = engine.checkout(user, checkout_cmd()).await.unwrap();
    assert_eq!(order.subtotal, Money::new(48_00));

    // Inactive products are a hard failure too.
    engine.set_product_stock(gadget, 10).await.unwrap();
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();
    engine.set_product_active(gadget, false).await.unwrap();
    let err = engine.checkout(user, checkout_cmd()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "product_id", .. }));
}

#[tokio::test]
async fn orders_are_listed_newest_first_and_ownership_checked() {
    let engine = engine_with_db().await;
    let alice = shopper(&engine, "alice@example.com").await;
    let mallory = shopper(&engine, "mallory@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(10_00), 100).await;

    engine.add_item_to_cart(alice, gadget, 1).await.unwrap();
    let first = engine.checkout(alice, checkout_cmd()).await.unwrap();
    engine.add_item_to_cart(alice, gadget, 2).await.unwrap();
    let second = engine.checkout(alice, checkout_cmd()).await.unwrap();

    let orders = engine.list_orders(alice).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, second.id);
    assert_eq!(orders[1].id, first.id);
    assert_eq!(orders[0].items.len(), 1);

    assert!(engine.list_orders(mallory).await.unwrap().is_empty());
    let err = engine.order(mallory, first.id).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::OwnershipDenied {
            entity: "order",
            id: first.id,
            user_id: mallory
        }
    );
}

#[tokio::test]
async fn status_moves_freely_until_terminal() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(10_00), 10).await;
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();
    let order = engine.checkout(user, checkout_cmd()).await.unwrap();

    for status in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered] {
        engine.update_order_status(user, order.id, status).await.unwrap();
    }
    assert_eq!(
        engine.order(user, order.id).await.unwrap().status,
        OrderStatus::Delivered
    );

    let err = engine
        .update_order_status(user, order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "status", .. }));

    // Cancelled is terminal as well.
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();
    let other = engine.checkout(user, checkout_cmd()).await.unwrap();
    engine
        .update_order_status(user, other.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let err = engine
        .update_order_status(user, other.id, OrderStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "status", .. }));
}

#[tokio::test]
async fn tracking_and_notes_are_the_only_mutable_order_fields() {
    let engine = engine_with_db().await;
    let user = shopper(&engine, "alice@example.com").await;
    let gadget = product(&engine, "GAD-42", Money::new(10_00), 10).await;
    engine.add_item_to_cart(user, gadget, 1).await.unwrap();
    let order = engine.checkout(user, checkout_cmd()).await.unwrap();
    assert_eq!(order.tracking_number, None);

    engine
        .set_order_tracking(user, order.id, Some("TRACK-123"))
        .await
        .unwrap();
    engine.set_order_notes(user, order.id, Some("leave at door")).await.unwrap();

    let reloaded = engine.order(user, order.id).await.unwrap();
    assert_eq!(reloaded.tracking_number.as_deref(), Some("TRACK-123"));
    assert_eq!(reloaded.notes.as_deref(), Some("leave at door"));

    engine.set_order_tracking(user, order.id, None).await.unwrap();
    assert_eq!(
        engine.order(user, order.id).await.unwrap().tracking_number,
        None
    );
}
