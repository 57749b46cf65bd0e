mod common;

use common::TestApp;
use teahouse_api::{
    entities::user::UserRole,
    errors::ServiceError,
    services::{LoginInput, RegisterInput},
};

fn registration(email: &str) -> RegisterInput {
    RegisterInput {
        name: "Priya Raman".into(),
        email: email.into(),
        password: "steep-four-minutes".into(),
        phone: Some("+1-555-0199".into()),
    }
}

#[tokio::test]
async fn register_then_login_stamps_last_login() {
    let app = TestApp::new().await;

    let user = app
        .state
        .services
        .users
        .register(registration("priya@example.com"))
        .await
        .unwrap();
    assert_eq!(user.role, UserRole::Customer);
    assert!(user.is_active);
    assert!(user.last_login.is_none());
    // Stored hash is not the raw password
    assert_ne!(user.password_hash, "steep-four-minutes");

    let response = app
        .state
        .services
        .users
        .login(LoginInput {
            email: "priya@example.com".into(),
            password: "steep-four-minutes".into(),
        })
        .await
        .unwrap();

    assert!(response.user.last_login.is_some());
    assert!(!response.token.access_token.is_empty());

    // The issued token resolves back to the same user
    let claims = app
        .state
        .auth
        .validate_token(&response.token.access_token)
        .unwrap();
    assert_eq!(claims.sub, response.user.id.to_string());
}

#[tokio::test]
async fn email_is_unique_and_case_insensitive() {
    let app = TestApp::new().await;

    app.state
        .services
        .users
        .register(registration("dup@example.com"))
        .await
        .unwrap();

    let result = app
        .state
        .services
        .users
        .register(registration("DUP@example.com"))
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    // Login works with any casing of the address
    let response = app
        .state
        .services
        .users
        .login(LoginInput {
            email: "Dup@Example.com".into(),
            password: "steep-four-minutes".into(),
        })
        .await
        .unwrap();
    assert_eq!(response.user.email, "dup@example.com");
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_deactivated_accounts() {
    let app = TestApp::new().await;
    let user = app
        .state
        .services
        .users
        .register(registration("gate@example.com"))
        .await
        .unwrap();

    let result = app
        .state
        .services
        .users
        .login(LoginInput {
            email: "gate@example.com".into(),
            password: "wrong".into(),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));

    let result = app
        .state
        .services
        .users
        .login(LoginInput {
            email: "nobody@example.com".into(),
            password: "steep-four-minutes".into(),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));

    // Deactivate and retry with the right password
    let (admin, _) = app.create_admin("root@example.com").await;
    app.state
        .services
        .users
        .set_active(admin.id, user.id, false)
        .await
        .unwrap();

    let result = app
        .state
        .services
        .users
        .login(LoginInput {
            email: "gate@example.com".into(),
            password: "steep-four-minutes".into(),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
}

#[tokio::test]
async fn admins_cannot_demote_or_deactivate_themselves() {
    let app = TestApp::new().await;
    let (admin, _) = app.create_admin("self@example.com").await;
    let (other, _) = app.create_customer("promoted@example.com").await;

    let result = app
        .state
        .services
        .users
        .set_role(admin.id, admin.id, UserRole::Customer)
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    let result = app
        .state
        .services
        .users
        .set_active(admin.id, admin.id, false)
        .await;
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    // Managing someone else works
    let promoted = app
        .state
        .services
        .users
        .set_role(admin.id, other.id, UserRole::Admin)
        .await
        .unwrap();
    assert_eq!(promoted.role, UserRole::Admin);

    let deactivated = app
        .state
        .services
        .users
        .set_active(admin.id, other.id, false)
        .await
        .unwrap();
    assert!(!deactivated.is_active);

    // Reactivating the same account is allowed, including for oneself
    let reactivated = app
        .state
        .services
        .users
        .set_active(admin.id, other.id, true)
        .await
        .unwrap();
    assert!(reactivated.is_active);
}

#[tokio::test]
async fn profile_updates_touch_only_given_fields() {
    let app = TestApp::new().await;
    let user = app
        .state
        .services
        .users
        .register(registration("profile@example.com"))
        .await
        .unwrap();

    let updated = app
        .state
        .services
        .users
        .update_profile(
            user.id,
            teahouse_api::services::users::UpdateProfileInput {
                name: Some("Priya R.".into()),
                phone: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Priya R.");
    assert_eq!(updated.phone.as_deref(), Some("+1-555-0199"));

    let result = app
        .state
        .services
        .users
        .update_profile(
            user.id,
            teahouse_api::services::users::UpdateProfileInput {
                name: Some("  ".into()),
                phone: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn user_listing_paginates() {
    let app = TestApp::new().await;
    for i in 0..5 {
        app.create_customer(&format!("user{}@example.com", i)).await;
    }

    let (page1, total) = app.state.services.users.list_users(1, 2).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(page1.len(), 2);

    let (page3, _) = app.state.services.users.list_users(3, 2).await.unwrap();
    assert_eq!(page3.len(), 1);
}
