//! Authentication middleware.
//!
//! API guards read `Authorization: Bearer <token>` when the header is present
//! and fall back to the token stored in the session otherwise. Page guards
//! only use the session and redirect to the login page on failure.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use rapc_core::auth::AuthError;
use rapc_core::models::auth::User;
use rapc_core::session::{self, FlashError};
use tracing::{error, warn};

use crate::AppState;
use crate::error::AppError;
use crate::services;

/// Identity resolved by the guards, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// Guests are accepted when guest login is enabled.
pub async fn require_user(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let guest_accepted = state.config.enable_guest_login;
    guard_api(&state, &jar, request, next, guest_accepted).await
}

/// Guests are rejected.
pub async fn require_member(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard_api(&state, &jar, request, next, false).await
}

pub async fn require_session_user(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let guest_accepted = state.config.enable_guest_login;
    guard_page(&state, jar, request, next, guest_accepted).await
}

pub async fn require_session_member(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard_page(&state, jar, request, next, false).await
}

async fn guard_api(
    state: &AppState,
    jar: &CookieJar,
    mut request: Request,
    next: Next,
    guest_accepted: bool,
) -> Result<Response, AppError> {
    let bearer = bearer_token(request.headers());
    let identity = resolve(state, bearer, jar, guest_accepted)
        .await
        .map_err(reject)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn guard_page(
    state: &AppState,
    jar: CookieJar,
    mut request: Request,
    next: Next,
    guest_accepted: bool,
) -> Result<Response, AppError> {
    let mut session = services::session::open(state, &jar).await;
    match session::validate_stored_token(&session, &state.auth, guest_accepted).await {
        Ok((user, token)) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { user, token });
            Ok(next.run(request).await)
        }
        Err(e) => {
            let rejected = reject(e);
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            session::set_error(
                &mut session,
                FlashError {
                    status: rejected.status().as_u16(),
                    code: rejected.code().to_string(),
                    message: rejected.public_message().to_string(),
                },
            )
            .await?;
            session::set_prev_route(&mut session, &method, &path).await?;
            let jar = services::session::attach(jar, &session, state);
            Ok((jar, Redirect::to("/login")).into_response())
        }
    }
}

/// Token from the `Authorization` header, if the header is present.
fn bearer_token(headers: &HeaderMap) -> Option<Result<String, AuthError>> {
    let value = headers.get(AUTHORIZATION)?;
    let token = value
        .to_str()
        .map_err(|_| AuthError::TokenInvalid("authorization header is not text".into()))
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .map(str::to_string)
                .ok_or_else(|| AuthError::TokenInvalid("invalid authorization scheme".into()))
        });
    Some(token)
}

/// Validate the header token when one was presented, else the session's.
async fn resolve(
    state: &AppState,
    bearer: Option<Result<String, AuthError>>,
    jar: &CookieJar,
    guest_accepted: bool,
) -> Result<AuthenticatedUser, AuthError> {
    if let Some(token) = bearer {
        let token = token?;
        let user = state.auth.validate_token(&token, guest_accepted).await?;
        return Ok(AuthenticatedUser { user, token });
    }

    let session = services::session::open(state, jar).await;
    let (user, token) = session::validate_stored_token(&session, &state.auth, guest_accepted).await?;
    Ok(AuthenticatedUser { user, token })
}

/// Every guard failure rejects the request.
///
/// A token naming a user that no longer exists is treated as unauthenticated,
/// and so is a session holding something other than a token.
fn reject(e: AuthError) -> AppError {
    match e {
        AuthError::UserNotFound => {
            warn!("token refers to an unknown user");
            AppError::Unauthorized {
                code: "user_not_found",
                message: "user not found".into(),
            }
        }
        AuthError::InvalidType(detail) => {
            error!(%detail, "session token has an unexpected type");
            AppError::Unauthorized {
                code: "token_invalid",
                message: "invalid token".into(),
            }
        }
        other => AppError::from(other),
    }
}
