//! End-to-end password lifecycle against the in-memory stores.

use std::sync::Arc;

use rapc_core::auth::jwt::JwtSettings;
use rapc_core::auth::memory::MemoryCredentialStore;
use rapc_core::auth::password::hash_password;
use rapc_core::auth::{AuthError, AuthService, AuthSettings, CredentialStore, GuestSettings};
use rapc_core::models::auth::{NewUser, User};
use rapc_core::models::payload::{
    AttemptLoginPayload, CreateUserPayload, RenewPasswordPayload, RequestResetPayload,
    ResetPasswordPayload,
};
use rapc_core::session::memory::MemorySessionBackend;
use rapc_core::session::{self, SessionStore};
use rapc_core::validation::Validator;

fn auth(store: Arc<MemoryCredentialStore>) -> AuthService {
    AuthService::new(
        store,
        Arc::new(Validator::new()),
        AuthSettings {
            jwt: JwtSettings::new("lifecycle-secret"),
            guest: GuestSettings::default(),
        },
    )
}

async fn admin(store: &MemoryCredentialStore) -> User {
    store
        .create_user(NewUser {
            username: "admin".into(),
            full_name: "Admin".into(),
            email: "admin@x.com".into(),
            password_hash: hash_password("admin-pw").unwrap(),
            password_must_change: false,
            is_guest: false,
            created_by: "SYSTEM".into(),
        })
        .await
        .unwrap()
}

fn login(email: &str, password: &str) -> AttemptLoginPayload {
    AttemptLoginPayload {
        email: email.into(),
        password: password.into(),
        remember_me: false,
    }
}

#[tokio::test]
async fn created_user_renews_generated_password() {
    let store = Arc::new(MemoryCredentialStore::new());
    let author = admin(&store).await;
    let auth = auth(store);

    let (_, generated) = auth
        .create_user(
            &CreateUserPayload {
                username: "alice".into(),
                full_name: "Alice".into(),
                email: "alice@x.com".into(),
                is_guest: false,
            },
            &author,
        )
        .await
        .unwrap();

    let user = auth
        .attempt_login(&login("alice@x.com", &generated))
        .await
        .unwrap();
    assert!(user.password_must_change);

    auth.renew_password(
        &user,
        &RenewPasswordPayload {
            password: "NewP@55w0rd!".into(),
            confirm_password: "NewP@55w0rd!".into(),
        },
    )
    .await
    .unwrap();

    let old = auth.attempt_login(&login("alice@x.com", &generated)).await;
    assert!(matches!(old, Err(AuthError::LoginFailed(_))));

    let renewed = auth
        .attempt_login(&login("alice@x.com", "NewP@55w0rd!"))
        .await
        .unwrap();
    assert!(!renewed.password_must_change);
}

#[tokio::test]
async fn reset_flow_issues_usable_session_token() {
    let store = Arc::new(MemoryCredentialStore::new());
    admin(&store).await;
    let auth = auth(store);
    let sessions = SessionStore::new(
        Arc::new(MemorySessionBackend::new()),
        chrono::Duration::hours(1),
    );

    let (_, record) = auth
        .request_reset(&RequestResetPayload {
            email: "admin@x.com".into(),
        })
        .await
        .unwrap();
    let user = auth
        .submit_reset_password(&ResetPasswordPayload {
            email: "admin@x.com".into(),
            token: record.token,
            password: "fresh-pw".into(),
            confirm_password: "fresh-pw".into(),
        })
        .await
        .unwrap();

    let mut web = sessions.load(None).await;
    let token = auth.issue_token(&user, false).unwrap();
    session::save_token(&mut web, &token).await.unwrap();

    let reopened = sessions.load(Some(web.id())).await;
    let (resolved, _) = session::validate_stored_token(&reopened, &auth, false)
        .await
        .unwrap();
    assert_eq!(resolved.email, "admin@x.com");

    assert!(auth.attempt_login(&login("admin@x.com", "fresh-pw")).await.is_ok());
    assert!(auth.attempt_login(&login("admin@x.com", "admin-pw")).await.is_err());
}
