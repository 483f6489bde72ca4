//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rapc_core::auth::{AuthError, ErrorKind};
use rapc_core::session::SessionError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Internal error text attached to a response for the debug layer.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        code: &'static str,
        message: String,
        errors: Vec<String>,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Forbidden: {message}")]
    Forbidden { code: &'static str, message: String },

    #[error("Not found: {message}")]
    NotFound { code: &'static str, message: String },

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. } => *code,
            AppError::Internal(_) => "internal",
        }
    }

    /// Message shown to clients. Never contains internal details.
    pub fn public_message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. } => message.as_str(),
            AppError::Internal(_) => "Internal server error",
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::Forbidden { .. } => "forbidden",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let errors = match &self {
            AppError::Validation { errors, .. } if !errors.is_empty() => Some(errors.clone()),
            _ => None,
        };
        let body = Json(ErrorResponse {
            error: self.error_kind().to_string(),
            code: self.code().to_string(),
            message: self.public_message().to_string(),
            errors,
            detail: None,
        });
        let mut response = (self.status(), body).into_response();
        if let AppError::Internal(detail) = self {
            error!(detail = %detail, "internal error");
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let code = e.code();
        match e.kind() {
            ErrorKind::Validation => match e {
                AuthError::ValidationFailed(errors) => AppError::Validation {
                    code,
                    message: "Validation error".into(),
                    errors,
                },
                other => AppError::Validation {
                    code,
                    message: other.public_message(),
                    errors: Vec::new(),
                },
            },
            ErrorKind::Authentication => AppError::Unauthorized {
                code,
                message: e.public_message(),
            },
            ErrorKind::Authorization => AppError::Forbidden {
                code,
                message: e.public_message(),
            },
            ErrorKind::NotFound => AppError::NotFound {
                code,
                message: e.public_message(),
            },
            ErrorKind::Conflict => AppError::Conflict {
                code,
                message: e.public_message(),
            },
            ErrorKind::Internal => AppError::Internal(e.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Internal(format!("session: {e}"))
    }
}
