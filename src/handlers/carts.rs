use crate::handlers::common::{success_response, success_with_message, validate_input};
use crate::{
    auth::AuthUser,
    entities::cart_item::Customization,
    errors::ServiceError,
    services::AddItemInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Routes for the authenticated user's cart. The cart is created lazily on
/// first access.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", put(update_item).delete(remove_item))
        .route("/discount", post(apply_discount))
        .route("/tax", put(set_tax_rate))
        .route("/delivery-fee", put(set_delivery_fee))
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .get_or_create_cart(user.user_id)
        .await?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .add_item(
            user.user_id,
            AddItemInput {
                product_id: payload.product_id,
                quantity: payload.quantity,
                customizations: payload.customizations,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(success_response(cart))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .update_item_quantity(
            user.user_id,
            product_id,
            payload.quantity,
            payload.customizations,
        )
        .await?;
    Ok(success_response(cart))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    payload: Option<Json<RemoveItemRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let customizations = payload.and_then(|Json(p)| p.customizations);

    let cart = state
        .services
        .cart
        .remove_item(user.user_id, product_id, customizations)
        .await?;
    Ok(success_response(cart))
}

async fn apply_discount(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<ApplyDiscountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .apply_discount(
            user.user_id,
            payload.code,
            payload.amount.unwrap_or(Decimal::ZERO),
            payload.percentage.unwrap_or(Decimal::ZERO),
        )
        .await?;
    Ok(success_response(cart))
}

async fn set_tax_rate(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<SetTaxRateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .set_tax_rate(user.user_id, payload.rate)
        .await?;
    Ok(success_response(cart))
}

async fn set_delivery_fee(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<SetDeliveryFeeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .set_delivery_fee(user.user_id, payload.fee)
        .await?;
    Ok(success_response(cart))
}

async fn clear_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.clear_cart(user.user_id).await?;
    Ok(success_with_message(cart, "Cart cleared"))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub customizations: Option<Vec<Customization>>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub customizations: Option<Vec<Customization>>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub customizations: Option<Vec<Customization>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyDiscountRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct SetTaxRateRequest {
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SetDeliveryFeeRequest {
    pub fee: Decimal,
}
