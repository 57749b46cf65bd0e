use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::order::{OrderStatus, OrderType, PaymentMethod},
    errors::ServiceError,
    services::{CheckoutInput, CustomerInfo},
    AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Routes for checkout and order lifecycle
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_my_orders))
        .route("/all", get(list_all_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", put(cancel_order))
        .route("/:id/rating", post(add_rating))
        .route("/:id/notes", get(list_notes).post(add_note))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    validate_input(&payload.customer_info)?;

    let order = state
        .services
        .checkout
        .checkout(
            user.user_id,
            CheckoutInput {
                order_type: payload.order_type,
                payment_method: payload.payment_method,
                customer_info: CustomerInfo {
                    name: payload.customer_info.name,
                    phone: payload.customer_info.phone,
                    email: payload.customer_info.email,
                },
                table_number: payload.table_number,
                special_instructions: payload.special_instructions,
            },
        )
        .await?;

    Ok(created_response(order))
}

async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, limit) = query.clamp(state.config.api_max_page_size as u64);
    let (orders, total) = state
        .services
        .orders
        .list_orders_for_user(user.user_id, page, limit)
        .await?;
    Ok(success_response(PaginatedResponse::new(
        orders, total, page, limit,
    )))
}

async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<OrderBoardQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.config.api_default_page_size as u64)
        .clamp(1, state.config.api_max_page_size as u64);

    let (orders, total) = state
        .services
        .orders
        .list_all_orders(query.status, page, limit)
        .await?;
    Ok(success_response(PaginatedResponse::new(
        orders, total, page, limit,
    )))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id, user.user_id, user.is_admin())
        .await?;
    Ok(success_response(order))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status)
        .await?;
    Ok(success_response(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .cancel_order(id, user.user_id, user.is_admin(), payload.reason)
        .await?;
    Ok(success_response(order))
}

async fn add_rating(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddRatingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .add_rating(id, user.user_id, payload.score, payload.comment)
        .await?;
    Ok(success_response(order))
}

async fn add_note(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let note = state
        .services
        .orders
        .add_note(id, Some(admin.user_id), payload.body)
        .await?;
    Ok(created_response(note))
}

async fn list_notes(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let notes = state.services.orders.list_notes(id).await?;
    Ok(success_response(notes))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerInfoRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 30))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub customer_info: CustomerInfoRequest,
    #[validate(range(min = 1, max = 500))]
    pub table_number: Option<i32>,
    #[validate(length(max = 1000))]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderBoardQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddRatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub score: i16,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddNoteRequest {
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
}
