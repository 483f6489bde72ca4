//! # rapc_api
//!
//! HTTP API and web session surface for Rap-C.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use rapc_core::auth::memory::MemoryCredentialStore;
use rapc_core::auth::pg::PgCredentialStore;
use rapc_core::auth::{AuthService, CredentialStore};
use rapc_core::session::memory::MemorySessionBackend;
use rapc_core::session::pg::PgSessionBackend;
use rapc_core::session::{SessionBackend, SessionStore};
use rapc_core::validation::Validator;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, users, web};
use crate::middleware::auth::{
    require_member, require_session_member, require_session_user, require_user,
};
use crate::middleware::password::{require_password_changed, require_password_changed_page};
use crate::services::notifier::Notifier;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login, token and reset use cases.
    pub auth: AuthService,
    /// Server-side sessions.
    pub sessions: SessionStore,
    /// Delivers reset links and welcome messages.
    pub notifier: Arc<dyn Notifier>,
    /// PostgreSQL pool, absent when running on in-memory stores.
    pub pool: Option<PgPool>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// State backed by PostgreSQL.
    pub fn postgres(pool: PgPool, config: ApiConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::build(
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgSessionBackend::new(pool.clone())),
            Some(pool),
            config,
            notifier,
        )
    }

    /// State backed by process memory. Nothing survives a restart.
    pub fn in_memory(config: ApiConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::build(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionBackend::new()),
            None,
            config,
            notifier,
        )
    }

    fn build(
        store: Arc<dyn CredentialStore>,
        backend: Arc<dyn SessionBackend>,
        pool: Option<PgPool>,
        config: ApiConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let auth = AuthService::new(store, Arc::new(Validator::new()), config.auth_settings());
        let sessions = SessionStore::new(backend, config.session_max_age());
        Self {
            auth,
            sessions,
            notifier,
            pool,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `rapc_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    rapc_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/login", post(auth::login_handler))
        .route("/api/guest-login", post(auth::guest_login_handler))
        .route("/api/request-reset", post(auth::request_reset_handler))
        .route("/api/reset-password", post(auth::reset_password_handler))
        .route("/", get(web::index))
        .route("/login", get(web::login_page))
        .route("/submit-token-session", post(web::submit_token_session))
        .route("/logout", post(web::logout))
        .route("/forgot-password", get(web::forgot_password_page))
        .route("/reset-password", get(web::reset_password_page));

    // Members, even with a pending password change
    let member = Router::new()
        .route("/api/renew-password", put(auth::renew_password_handler))
        .route_layer(from_fn_with_state(state.clone(), require_member));

    // Members with a chosen password
    let member_ready = Router::new()
        .route("/api/users", post(users::create_user_handler))
        .route_layer(from_fn(require_password_changed))
        .route_layer(from_fn_with_state(state.clone(), require_member));

    // Any user with a chosen password
    let user_ready = Router::new()
        .route("/api/me", get(users::me_handler))
        .route_layer(from_fn(require_password_changed))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let member_pages = Router::new()
        .route("/renew-password", get(web::renew_password_page))
        .route_layer(from_fn_with_state(state.clone(), require_session_member));

    let user_pages = Router::new()
        .route("/dashboard", get(web::dashboard))
        .route_layer(from_fn(require_password_changed_page))
        .route_layer(from_fn_with_state(state.clone(), require_session_user));

    let app = Router::new()
        .merge(public)
        .merge(member)
        .merge(member_ready)
        .merge(user_ready)
        .merge(member_pages)
        .merge(user_pages)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let app = if state.config.enable_debug {
        app.layer(from_fn(middleware::debug::expose_error_detail))
    } else {
        app
    };

    app.with_state(state)
}
