mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use teahouse_api::{
    entities::{
        order::{OrderStatus, OrderType, PaymentMethod, PaymentStatus},
        Product,
    },
    errors::ServiceError,
    services::{AddItemInput, CheckoutInput, CustomerInfo},
};
use uuid::Uuid;

fn takeaway_input() -> CheckoutInput {
    CheckoutInput {
        order_type: OrderType::Takeaway,
        payment_method: PaymentMethod::Cash,
        customer_info: CustomerInfo {
            name: "Nora Fernsby".into(),
            phone: "+1-555-0101".into(),
            email: Some("nora@example.com".into()),
        },
        table_number: None,
        special_instructions: None,
    }
}

async fn fill_cart(app: &TestApp, user_id: Uuid, product_id: Uuid, quantity: i32) {
    app.state
        .services
        .cart
        .add_item(
            user_id,
            AddItemInput {
                product_id,
                quantity,
                customizations: None,
                notes: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn checkout_converts_cart_into_order_and_decrements_stock() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("checkout@example.com").await;
    let product = app.seed_product("Jasmine Pearls", dec!(100.00), 10).await;

    fill_cart(&app, user.id, product.id, 2).await;

    let order = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();

    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.subtotal, dec!(200.00));
    assert_eq!(order.order.total, dec!(200.00));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].unit_price, dec!(100.00));
    assert_eq!(order.items[0].name, "Jasmine Pearls");

    // Stock reserved at checkout
    let live = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.stock_quantity, 8);

    // Cart cleared
    let cart = app
        .state
        .services
        .cart
        .get_or_create_cart(user.id)
        .await
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.cart.final_total, Decimal::ZERO);
}

#[tokio::test]
async fn checkout_fails_on_empty_cart() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("empty@example.com").await;

    let result = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));

    // An existing-but-empty cart behaves the same
    app.state
        .services
        .cart
        .get_or_create_cart(user.id)
        .await
        .unwrap();
    let result = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn checkout_revalidates_stale_cart_and_leaves_no_partial_effects() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("stale@example.com").await;
    let product = app.seed_product("White Peony", dec!(15.00), 5).await;

    fill_cart(&app, user.id, product.id, 5).await;

    // Stock shrank between carting and checkout
    app.state
        .services
        .catalog
        .set_stock(product.id, 3)
        .await
        .unwrap();

    let result = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await;
    assert!(matches!(result, Err(ServiceError::OutOfStock(_))));

    // Nothing was committed: stock untouched, cart intact, no order rows
    let live = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.stock_quantity, 3);

    let cart = app
        .state
        .services
        .cart
        .get_or_create_cart(user.id)
        .await
        .unwrap();
    assert_eq!(cart.items.len(), 1);

    let (orders, total) = app
        .state
        .services
        .orders
        .list_orders_for_user(user.id, 1, 10)
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn checkout_rejects_archived_product() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("archived@example.com").await;
    let product = app.seed_product("Seasonal Blend", dec!(8.00), 10).await;

    fill_cart(&app, user.id, product.id, 1).await;

    app.state
        .services
        .catalog
        .archive_product(product.id)
        .await
        .unwrap();

    let result = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await;
    assert!(matches!(result, Err(ServiceError::Unavailable(_))));
}

#[tokio::test]
async fn order_pricing_block_is_copied_from_cart() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("pricing@example.com").await;
    let product = app.seed_product("Ceremonial Matcha", dec!(50.00), 10).await;

    fill_cart(&app, user.id, product.id, 2).await;
    app.state
        .services
        .cart
        .apply_discount(user.id, "WELCOME10".into(), Decimal::ZERO, dec!(10))
        .await
        .unwrap();
    app.state
        .services
        .cart
        .set_tax_rate(user.id, dec!(8))
        .await
        .unwrap();
    app.state
        .services
        .cart
        .set_delivery_fee(user.id, dec!(4.00))
        .await
        .unwrap();

    let order = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();

    // total_price 100, discount 10, subtotal 90, tax 7.20, delivery 4
    assert_eq!(order.order.subtotal, dec!(100.00));
    assert_eq!(order.order.discount_amount, dec!(10.00));
    assert_eq!(order.order.tax_amount, dec!(7.20));
    assert_eq!(order.order.delivery_fee, dec!(4.00));
    assert_eq!(order.order.total, dec!(101.20));
}

#[tokio::test]
async fn order_item_snapshots_survive_product_edits() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("snapshot@example.com").await;
    let product = app.seed_product("Golden Monkey", dec!(20.00), 10).await;

    fill_cart(&app, user.id, product.id, 1).await;
    let order = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();

    // Rename and reprice the product after the order exists
    let live = Product::find_by_id(product.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut live: teahouse_api::entities::product::ActiveModel = live.into();
    live.name = Set("Renamed Blend".to_string());
    live.price = Set(dec!(99.00));
    live.update(&*app.state.db).await.unwrap();

    let reloaded = app
        .state
        .services
        .orders
        .get_order(order.order.id, user.id, false)
        .await
        .unwrap();
    assert_eq!(reloaded.items[0].name, "Golden Monkey");
    assert_eq!(reloaded.items[0].unit_price, dec!(20.00));
}

#[tokio::test]
async fn online_payment_is_recorded_paid_cash_stays_pending() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("payment@example.com").await;
    let product = app.seed_product("Iced Lemon Tea", dec!(3.50), 20).await;

    fill_cart(&app, user.id, product.id, 1).await;
    let cash_order = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();
    assert_eq!(cash_order.order.payment_status, PaymentStatus::Pending);

    fill_cart(&app, user.id, product.id, 1).await;
    let mut online = takeaway_input();
    online.payment_method = PaymentMethod::Online;
    let online_order = app
        .state
        .services
        .checkout
        .checkout(user.id, online)
        .await
        .unwrap();
    assert_eq!(online_order.order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn dine_in_requires_table_number() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("dinein@example.com").await;
    let product = app.seed_product("Pot of Assam", dec!(6.00), 10).await;

    fill_cart(&app, user.id, product.id, 1).await;

    let mut input = takeaway_input();
    input.order_type = OrderType::DineIn;
    let result = app.state.services.checkout.checkout(user.id, input).await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));

    let mut input = takeaway_input();
    input.order_type = OrderType::DineIn;
    input.table_number = Some(12);
    let order = app
        .state
        .services
        .checkout
        .checkout(user.id, input)
        .await
        .unwrap();
    assert_eq!(order.order.table_number, Some(12));
}

#[tokio::test]
async fn order_numbers_follow_the_daily_sequence() {
    let app = TestApp::new().await;
    let (user, _) = app.create_customer("sequence@example.com").await;
    let product = app.seed_product("House Blend", dec!(5.00), 100).await;

    let today = chrono::Utc::now().format("%Y%m%d").to_string();

    // First order of the day ends in 0001
    fill_cart(&app, user.id, product.id, 1).await;
    let first = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();
    assert_eq!(first.order.order_number, format!("{}0001", today));

    // Seed an existing order ending 0007 and expect 0008 next
    let seeded = teahouse_api::entities::order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(format!("{}0007", today)),
        user_id: Set(user.id),
        status: Set(OrderStatus::Pending),
        order_type: Set(OrderType::Takeaway),
        table_number: Set(None),
        customer_name: Set("Seed".into()),
        customer_phone: Set("+1-555-0000".into()),
        customer_email: Set(None),
        special_instructions: Set(None),
        subtotal: Set(dec!(1.00)),
        discount_amount: Set(Decimal::ZERO),
        tax_amount: Set(Decimal::ZERO),
        delivery_fee: Set(Decimal::ZERO),
        total: Set(dec!(1.00)),
        currency: Set("USD".into()),
        payment_method: Set(PaymentMethod::Cash),
        payment_status: Set(PaymentStatus::Pending),
        cancellation_reason: Set(None),
        rating_score: Set(None),
        rating_comment: Set(None),
        ordered_at: Set(chrono::Utc::now()),
        confirmed_at: Set(None),
        preparing_at: Set(None),
        ready_at: Set(None),
        completed_at: Set(None),
        cancelled_at: Set(None),
        actual_prep_minutes: Set(None),
        created_at: Set(chrono::Utc::now()),
        updated_at: Set(chrono::Utc::now()),
    };
    seeded.insert(&*app.state.db).await.unwrap();

    fill_cart(&app, user.id, product.id, 1).await;
    let next = app
        .state
        .services
        .checkout
        .checkout(user.id, takeaway_input())
        .await
        .unwrap();
    assert_eq!(next.order.order_number, format!("{}0008", today));
}
