use crate::handlers::common::{success_response, success_with_message};
use crate::{
    auth::AdminUser, entities::user::UserRole, errors::ServiceError, AppState, ListQuery,
    PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Admin user management routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/role", put(set_role))
        .route("/:id/deactivate", put(deactivate_user))
        .route("/:id/activate", put(activate_user))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, limit) = query.clamp(state.config.api_max_page_size as u64);
    let (users, total) = state.services.users.list_users(page, limit).await?;
    Ok(success_response(PaginatedResponse::new(
        users, total, page, limit,
    )))
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .users
        .set_role(admin.user_id, id, payload.role)
        .await?;
    Ok(success_response(user))
}

async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .users
        .set_active(admin.user_id, id, false)
        .await?;
    Ok(success_with_message(user, "User deactivated"))
}

async fn activate_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .users
        .set_active(admin.user_id, id, true)
        .await?;
    Ok(success_with_message(user, "User activated"))
}

// Request DTOs

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}
