//! Typed accessors for the well-known session keys.

use tracing::warn;

use super::{
    ERROR_KEY, FlashError, FlashInfo, INFO_KEY, PREV_ROUTE_KEY, Session, SessionError,
    SessionValue, TOKEN_KEY,
};
use crate::auth::{AuthError, AuthService};
use crate::models::auth::User;

/// Store the identity token.
pub async fn save_token(session: &mut Session, token: &str) -> Result<(), SessionError> {
    session
        .set(TOKEN_KEY, SessionValue::Token(token.to_string()))
        .await
}

/// Validate the token held by the session, returning the user and the token.
pub async fn validate_stored_token(
    session: &Session,
    auth: &AuthService,
    guest_accepted: bool,
) -> Result<(User, String), AuthError> {
    match session.get(TOKEN_KEY) {
        None => Err(AuthError::TokenNotFound),
        Some(SessionValue::Token(token)) => {
            let user = auth.validate_token(token, guest_accepted).await?;
            Ok((user, token.clone()))
        }
        Some(other) => Err(AuthError::InvalidType(format!(
            "`{TOKEN_KEY}` holds {}",
            other.kind()
        ))),
    }
}

pub async fn set_error(session: &mut Session, error: FlashError) -> Result<(), SessionError> {
    session.set(ERROR_KEY, SessionValue::Error(error)).await
}

pub async fn take_error(session: &mut Session) -> Result<Option<FlashError>, SessionError> {
    match session.flash(ERROR_KEY).await? {
        Some(SessionValue::Error(e)) => Ok(Some(e)),
        Some(other) => {
            warn!(kind = other.kind(), "dropping unexpected value under `error`");
            Ok(None)
        }
        None => Ok(None),
    }
}

pub async fn set_info(session: &mut Session, info: FlashInfo) -> Result<(), SessionError> {
    session.set(INFO_KEY, SessionValue::Info(info)).await
}

pub async fn take_info(session: &mut Session) -> Result<Option<FlashInfo>, SessionError> {
    match session.flash(INFO_KEY).await? {
        Some(SessionValue::Info(i)) => Ok(Some(i)),
        Some(other) => {
            warn!(kind = other.kind(), "dropping unexpected value under `info`");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Remember where to go after logging in.
pub async fn set_prev_route(
    session: &mut Session,
    method: &str,
    path: &str,
) -> Result<(), SessionError> {
    session
        .set(
            PREV_ROUTE_KEY,
            SessionValue::PrevRoute {
                method: method.to_string(),
                path: path.to_string(),
            },
        )
        .await
}

/// Take the remembered `(method, path)`, if any.
pub async fn take_prev_route(
    session: &mut Session,
) -> Result<Option<(String, String)>, SessionError> {
    match session.flash(PREV_ROUTE_KEY).await? {
        Some(SessionValue::PrevRoute { method, path }) => Ok(Some((method, path))),
        _ => Ok(None),
    }
}

/// End the session.
pub async fn logout(session: &mut Session) -> Result<(), SessionError> {
    session.destroy().await
}
