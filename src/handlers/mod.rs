pub mod auth;
pub mod carts;
pub mod common;
pub mod orders;
pub mod products;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        CancelPolicy, CartService, CartSettings, CatalogService, CheckoutService, OrderService,
        UserService,
    },
};
use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    /// Build the service container from shared infrastructure handles.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        cfg: &AppConfig,
    ) -> Self {
        let cart_settings = CartSettings {
            default_tax_rate: Decimal::try_from(cfg.default_tax_rate_percent)
                .unwrap_or(Decimal::ZERO),
            default_delivery_fee: Decimal::try_from(cfg.default_delivery_fee)
                .unwrap_or(Decimal::ZERO),
            expiry: Duration::days(cfg.cart_expiry_days),
        };
        let cancel_policy = CancelPolicy {
            allow_from_ready: cfg.allow_cancel_when_ready,
        };

        let catalog = Arc::new(CatalogService::new(db.clone(), event_sender.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            cart_settings,
        ));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            cfg.default_currency.clone(),
            cfg.order_number_max_retries,
        ));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            cancel_policy,
        ));
        let users = Arc::new(UserService::new(db, event_sender, auth_service));

        Self {
            catalog,
            cart,
            checkout,
            orders,
            users,
        }
    }
}
