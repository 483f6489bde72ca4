//! User handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use rapc_core::models::auth::User;
use rapc_core::models::payload::CreateUserPayload;
use tracing::warn;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::CreateUserResponse;
use crate::services::notifier::login_link;

/// `GET /api/me`: the signed-in user.
pub async fn me_handler(Extension(identity): Extension<AuthenticatedUser>) -> Json<User> {
    Json(identity.user)
}

/// `POST /api/users`: create an account with a generated password.
///
/// The password is handed to the notifier and never returned.
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedUser>,
    Json(body): Json<CreateUserPayload>,
) -> AppResult<(StatusCode, Json<CreateUserResponse>)> {
    let (user, password) = state.auth.create_user(&body, &identity.user).await?;

    let delivered = match login_link(&state.config) {
        Ok(link) => state.notifier.welcome(&user, &password, &link).await,
        Err(e) => Err(e),
    };
    if let Err(e) = delivered {
        warn!(error = %e, user_id = user.id, "welcome message was not delivered");
    }

    Ok((StatusCode::CREATED, Json(CreateUserResponse { user })))
}
