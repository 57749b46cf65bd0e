mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;
use tower::ServiceExt;

/// Decimal JSON fields serialize as strings; compare numerically so storage
/// round-trips that change the scale don't break assertions.
fn decimal_field(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal field should be a string")).unwrap()
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let app = TestApp::new().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["service"], json!("teahouse-api"));
}

#[tokio::test]
async fn cart_requires_authentication() {
    let app = TestApp::new().await;
    let (status, body) = send(&app, Method::GET, "/api/cart", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn register_login_and_fetch_profile() {
    let app = TestApp::new().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "Tom Odell",
            "email": "tom@example.com",
            "password": "gunpowder-green",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    // Credentials never appear in responses
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({
            "email": "tom@example.com",
            "password": "gunpowder-green",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("tom@example.com"));
}

#[tokio::test]
async fn register_rejects_malformed_input_before_any_mutation() {
    let app = TestApp::new().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "name": "No Email",
            "email": "not-an-email",
            "password": "short",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn cart_flow_over_http_returns_envelope_with_totals() {
    let app = TestApp::new().await;
    let (_, token) = app.create_customer("http-cart@example.com").await;
    let product = app.seed_product("Breakfast Tin", dec!(10.00), 10).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&token),
        Some(json!({
            "product_id": product.id,
            "quantity": 2,
            "customizations": [
                {"option": "grind", "value": "loose", "additional_price": "0.50"}
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["cart"]["total_items"], json!(2));
    // (10.00 + 0.50) * 2
    assert_eq!(decimal_field(&body["data"]["cart"]["total_price"]), dec!(21.00));

    // Unknown product is a 404 with the envelope
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&token),
        Some(json!({
            "product_id": uuid::Uuid::new_v4(),
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn product_management_is_admin_gated() {
    let app = TestApp::new().await;
    let (_, customer_token) = app.create_customer("plain@example.com").await;
    let (_, admin_token) = app.create_admin("boss@example.com").await;

    let payload = json!({
        "name": "Test Oolong",
        "description": "Rolled oolong",
        "category": "oolong_tea",
        "price": "19.50",
        "stock_quantity": 5,
    });

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&customer_token),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&admin_token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    // Public catalog sees the new product without authentication
    let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert!(items.iter().any(|p| p["id"] == json!(product_id)));
}

#[tokio::test]
async fn admin_order_board_rejects_customers() {
    let app = TestApp::new().await;
    let (_, customer_token) = app.create_customer("nosy@example.com").await;

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/orders/all",
        Some(&customer_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn checkout_over_http_returns_created_order() {
    let app = TestApp::new().await;
    let (_, token) = app.create_customer("http-order@example.com").await;
    let product = app.seed_product("Sampler Box", dec!(100.00), 4).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&token),
        Some(json!({"product_id": product.id, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({
            "order_type": "takeaway",
            "payment_method": "cash",
            "customer_info": {"name": "Sam", "phone": "+1-555-0110"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal_field(&body["data"]["order"]["total"]), dec!(200.00));
    assert_eq!(body["data"]["order"]["status"], json!("pending"));

    // Second checkout on the now-empty cart fails with 400
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({
            "order_type": "takeaway",
            "payment_method": "cash",
            "customer_info": {"name": "Sam", "phone": "+1-555-0110"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}
