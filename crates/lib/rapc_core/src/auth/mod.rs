//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT management, the login and password-reset
//! flows, and the credential store those flows run against.

pub mod bootstrap;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod pg;
pub mod reset;
pub mod service;
pub mod store;

pub use service::{AuthService, AuthSettings, GuestSettings};
pub use store::CredentialStore;

use thiserror::Error;

/// Why a login attempt was refused. Logged, never shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    UnknownEmail,
    WrongPassword,
    Disabled,
}

/// Coarse error classes used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("wrong email or password")]
    LoginFailed(LoginFailure),

    #[error("guest login is disabled")]
    GuestLoginForbidden,

    #[error("cannot login as guest")]
    NotActuallyGuest,

    #[error("cannot use same password")]
    PasswordUnchanged,

    #[error("the password must be changed")]
    PasswordMustChange,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("token does not match user")]
    TokenMismatch,

    #[error("token session not found")]
    TokenNotFound,

    #[error("guest token is forbidden")]
    GuestForbidden,

    #[error("session value has invalid type: {0}")]
    InvalidType(String),

    #[error("user not found")]
    UserNotFound,

    #[error("request reset password not found")]
    ResetTokenNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Error class for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::ValidationFailed(_) | AuthError::PasswordUnchanged => ErrorKind::Validation,
            AuthError::LoginFailed(_)
            | AuthError::NotActuallyGuest
            | AuthError::TokenInvalid(_)
            | AuthError::TokenMismatch
            | AuthError::TokenNotFound => ErrorKind::Authentication,
            AuthError::GuestLoginForbidden
            | AuthError::GuestForbidden
            | AuthError::PasswordMustChange => ErrorKind::Authorization,
            AuthError::UserNotFound | AuthError::ResetTokenNotFound => ErrorKind::NotFound,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::InvalidType(_) | AuthError::DbError(_) | AuthError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::ValidationFailed(_) => "validation_failed",
            AuthError::LoginFailed(_) => "login_failed",
            AuthError::GuestLoginForbidden => "guest_login_forbidden",
            AuthError::NotActuallyGuest => "not_guest",
            AuthError::PasswordUnchanged => "password_unchanged",
            AuthError::PasswordMustChange => "password_must_change",
            AuthError::TokenInvalid(_) => "token_invalid",
            AuthError::TokenMismatch => "token_mismatch",
            AuthError::TokenNotFound => "token_not_found",
            AuthError::GuestForbidden => "guest_forbidden",
            AuthError::UserNotFound => "user_not_found",
            AuthError::ResetTokenNotFound => "reset_token_not_found",
            AuthError::Conflict(_) => "conflict",
            AuthError::InvalidType(_) | AuthError::DbError(_) | AuthError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Message safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::TokenInvalid(_) => "invalid token".to_string(),
            AuthError::InvalidType(_) | AuthError::DbError(_) | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
