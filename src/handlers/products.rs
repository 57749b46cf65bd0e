use crate::handlers::common::{created_response, success_response, validate_input};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::product::ProductCategory,
    errors::ServiceError,
    services::catalog::{CreateProductInput, ProductListFilter, ProductSort, UpdateProductInput},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Routes for the product catalog and reviews
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(archive_product),
        )
        .route("/:id/stock", put(set_stock))
        .route("/:id/reviews", get(list_reviews).post(add_review))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.config.api_default_page_size as u64)
        .clamp(1, state.config.api_max_page_size as u64);

    let filter = ProductListFilter {
        category: query.category,
        min_price: query.min_price,
        max_price: query.max_price,
        in_stock: query.in_stock,
        search: query.search,
        sort: query.sort,
    };

    let (products, total) = state
        .services
        .catalog
        .list_products(filter, page, limit)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        products, total, page, limit,
    )))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.get_active_product(id).await?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(CreateProductInput {
            name: payload.name,
            description: payload.description,
            category: payload.category,
            price: payload.price,
            original_price: payload.original_price,
            sale_price: payload.sale_price,
            sale_starts_at: payload.sale_starts_at,
            sale_ends_at: payload.sale_ends_at,
            stock_quantity: payload.stock_quantity,
            image_url: payload.image_url,
        })
        .await?;

    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

async fn archive_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.archive_product(id).await?;
    Ok(success_response(product))
}

async fn set_stock(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .set_stock(id, payload.quantity)
        .await?;
    Ok(success_response(product))
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let reviews = state.services.catalog.list_reviews(id).await?;
    Ok(success_response(reviews))
}

async fn add_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddReviewRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .add_review(id, user.user_id, payload.rating, payload.comment)
        .await?;
    Ok(success_response(product))
}

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<ProductCategory>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub search: Option<String>,
    pub sort: Option<ProductSort>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub stock_quantity: Option<i32>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetStockRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}
