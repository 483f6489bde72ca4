//! Password-must-change gate.
//!
//! Runs after an auth guard. Users created with a generated password must
//! pick their own before reaching anything else.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use rapc_core::auth::AuthError;

use super::auth::AuthenticatedUser;
use crate::error::AppError;

fn must_change(request: &Request) -> Result<bool, AppError> {
    request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|identity| identity.user.password_must_change)
        .ok_or_else(|| AppError::from(AuthError::TokenNotFound))
}

/// API variant: 403 `password_must_change`.
pub async fn require_password_changed(request: Request, next: Next) -> Result<Response, AppError> {
    if must_change(&request)? {
        return Err(AuthError::PasswordMustChange.into());
    }
    Ok(next.run(request).await)
}

/// Page variant: redirect to the renew-password page.
pub async fn require_password_changed_page(
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if must_change(&request)? {
        return Ok(Redirect::to("/renew-password").into_response());
    }
    Ok(next.run(request).await)
}
