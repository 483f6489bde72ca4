//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use rapc_core::auth::AuthError;
use rapc_core::models::payload::{
    AttemptLoginPayload, RenewPasswordPayload, RequestResetPayload, ResetPasswordPayload,
};
use tracing::{info, warn};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{MessageResponse, StatusResponse, TokenResponse};
use crate::services::notifier::reset_link;

/// Same answer whether or not the email is registered.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If the email is registered, a password reset link has been sent.";

/// `POST /api/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<AttemptLoginPayload>,
) -> AppResult<Json<TokenResponse>> {
    let user = state.auth.attempt_login(&body).await?;
    let token = state.auth.issue_token(&user, body.remember_me)?;
    Ok(Json(TokenResponse { token, user }))
}

/// `POST /api/guest-login`: authenticate as the configured guest.
pub async fn guest_login_handler(State(state): State<AppState>) -> AppResult<Json<TokenResponse>> {
    let user = state.auth.attempt_guest_login().await?;
    let token = state.auth.issue_token(&user, false)?;
    Ok(Json(TokenResponse { token, user }))
}

/// `PUT /api/renew-password`: replace the caller's password.
pub async fn renew_password_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedUser>,
    Json(body): Json<RenewPasswordPayload>,
) -> AppResult<Json<StatusResponse>> {
    state.auth.renew_password(&identity.user, &body).await?;
    Ok(Json(StatusResponse::ok()))
}

/// `POST /api/request-reset`: send a reset link.
///
/// Unknown emails get the same response as known ones.
pub async fn request_reset_handler(
    State(state): State<AppState>,
    Json(body): Json<RequestResetPayload>,
) -> AppResult<Json<MessageResponse>> {
    match state.auth.request_reset(&body).await {
        Ok((user, record)) => {
            let delivered = match reset_link(&state.config, &user.email, &record.token) {
                Ok(link) => state.notifier.password_reset(&user, &link).await,
                Err(e) => Err(e),
            };
            if let Err(e) = delivered {
                warn!(error = %e, user_id = user.id, "reset link was not delivered");
            }
        }
        Err(AuthError::UserNotFound) => {
            info!("password reset requested for an unknown email");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(MessageResponse {
        success: RESET_REQUESTED_MESSAGE.to_string(),
    }))
}

/// `POST /api/reset-password`: set a new password with a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordPayload>,
) -> AppResult<Json<TokenResponse>> {
    let user = state.auth.submit_reset_password(&body).await?;
    let token = state.auth.issue_token(&user, false)?;
    Ok(Json(TokenResponse { token, user }))
}
