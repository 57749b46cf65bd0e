#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use teahouse_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{
        product::{self, ProductCategory},
        user::{self, UserRole},
        ProductModel, UserModel,
    },
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

const TEST_JWT_SECRET: &str =
    "test_secret_key_for_testing_purposes_only_with_sixty_four_plus_characters";

/// Helper harness spinning up application state backed by an in-memory SQLite
/// database. Each `TestApp` owns a fresh database.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        // A single connection keeps the in-memory database alive and visible
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            auth_service.clone(),
            &cfg,
        );

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth_service,
            services,
        });

        let router = teahouse_api::app_router(state.clone());

        Self {
            state,
            router,
            _event_task: event_task,
        }
    }

    /// Insert a user directly and return it with a valid bearer token.
    pub async fn create_user(&self, email: &str, role: UserRole) -> (UserModel, String) {
        let now = chrono::Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test User".to_string()),
            email: Set(email.to_string()),
            password_hash: Set(teahouse_api::auth::hash_password("correct-horse-battery").unwrap()),
            phone: Set(None),
            role: Set(role),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let user = user
            .insert(&*self.state.db)
            .await
            .expect("failed to insert test user");

        let token = self
            .state
            .auth
            .generate_token(&user)
            .expect("failed to issue test token")
            .access_token;

        (user, token)
    }

    pub async fn create_customer(&self, email: &str) -> (UserModel, String) {
        self.create_user(email, UserRole::Customer).await
    }

    pub async fn create_admin(&self, email: &str) -> (UserModel, String) {
        self.create_user(email, UserRole::Admin).await
    }

    /// Insert an active product with the given price and stock.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductModel {
        let now = chrono::Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} description", name)),
            category: Set(ProductCategory::GreenTea),
            price: Set(price),
            original_price: Set(None),
            sale_price: Set(None),
            sale_starts_at: Set(None),
            sale_ends_at: Set(None),
            stock_quantity: Set(stock),
            in_stock: Set(stock > 0),
            is_active: Set(true),
            image_url: Set(Some(format!(
                "https://cdn.example.com/{}.jpg",
                name.to_lowercase().replace(' ', "-")
            ))),
            rating_average: Set(Decimal::ZERO),
            rating_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        product
            .insert(&*self.state.db)
            .await
            .expect("failed to insert test product")
    }
}
