use crate::{
    auth::{self, AccessToken, AuthService},
    entities::{
        user::{self, UserRole},
        User, UserModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// User account service: registration, login, profile updates, and the admin
/// management surface. Deactivation is a soft delete.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    auth_service: Arc<AuthService>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            auth_service,
        }
    }

    /// Register a new customer account.
    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserModel, ServiceError> {
        let email = input.email.trim().to_ascii_lowercase();

        let existing = User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&input.password)?;
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(email),
            password_hash: Set(password_hash),
            phone: Set(input.phone),
            role: Set(UserRole::Customer),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let user = user.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!("User registered: {}", user.id);
        Ok(user)
    }

    /// Verify credentials, stamp last_login, and issue an access token.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: LoginInput) -> Result<LoginResponse, ServiceError> {
        let email = credentials.email.trim().to_ascii_lowercase();

        let user = User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        if !auth::verify_password(&credentials.password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Invalid credentials".to_string(),
            ));
        }
        if !user.is_active {
            return Err(ServiceError::Unauthorized(
                "Account is deactivated".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.last_login = Set(Some(Utc::now()));
        let user = active.update(&*self.db).await?;

        let token = self.auth_service.generate_token(&user)?;
        self.event_sender
            .send_or_log(Event::UserLoggedIn(user.id))
            .await;
        Ok(LoginResponse { user, token })
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    /// Self-service profile update (name/phone only).
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<UserModel, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut user: user::ActiveModel = user.into();

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            user.name = Set(name);
        }
        if let Some(phone) = input.phone {
            user.phone = Set(Some(phone));
        }

        user.updated_at = Set(Utc::now());
        user.update(&*self.db).await.map_err(Into::into)
    }

    /// Admin listing, newest first.
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<UserModel>, u64), ServiceError> {
        let paginator = User::find()
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    /// Change a user's role. Admins may not change their own role.
    #[instrument(skip(self))]
    pub async fn set_role(
        &self,
        acting_admin: Uuid,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<UserModel, ServiceError> {
        if acting_admin == user_id {
            return Err(ServiceError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }

        let user = self.get_user(user_id).await?;
        let mut user: user::ActiveModel = user.into();
        user.role = Set(role);
        user.updated_at = Set(Utc::now());
        user.update(&*self.db).await.map_err(Into::into)
    }

    /// Activate or deactivate an account. Admins may not deactivate
    /// themselves.
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        acting_admin: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> Result<UserModel, ServiceError> {
        if acting_admin == user_id && !active {
            return Err(ServiceError::Forbidden(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let user = self.get_user(user_id).await?;
        let mut user: user::ActiveModel = user.into();
        user.is_active = Set(active);
        user.updated_at = Set(Utc::now());
        let user = user.update(&*self.db).await?;

        if !active {
            self.event_sender
                .send_or_log(Event::UserDeactivated(user_id))
                .await;
        }
        Ok(user)
    }
}

/// Input for registering a user
#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Input for self-service profile updates
#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Login credentials
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Login response: the user plus an issued access token
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserModel,
    pub token: AccessToken,
}
