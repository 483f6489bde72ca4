//! Password-reset token lifecycle.
//!
//! A request stores a random token per email. The token is accepted for one
//! hour after it was last issued and is cleared when the new password is
//! saved.

use chrono::{DateTime, Duration, Utc};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument};

use super::password::hash_password;
use super::service::{AuthService, login_failed};
use super::{AuthError, LoginFailure};
use crate::models::auth::{PasswordResetToken, User};
use crate::models::payload::{RequestResetPayload, ResetPasswordPayload, ValidateResetTokenPayload};

/// How long a reset token stays valid after it was issued.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

const RESET_TOKEN_LENGTH: usize = 64;

/// Generate a 64-character alphanumeric token from an OS-seeded generator.
pub fn generate_reset_token() -> Result<String, AuthError> {
    let rng = StdRng::try_from_os_rng()
        .map_err(|e| AuthError::Internal(format!("random source unavailable: {e}")))?;
    Ok(rng
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect())
}

/// Whether `supplied` matches `record` and the record is still fresh at `now`.
pub fn check_reset_token(record: &PasswordResetToken, supplied: &str, now: DateTime<Utc>) -> bool {
    !record.token.is_empty()
        && record.token == supplied
        && now <= record.updated_at + Duration::seconds(RESET_TOKEN_TTL_SECS)
}

impl AuthService {
    /// Issue (or re-issue) a reset token for a registered email.
    ///
    /// The returned record holds the plaintext token for the reset link.
    #[instrument(skip_all, fields(email = %payload.email))]
    pub async fn request_reset(
        &self,
        payload: &RequestResetPayload,
    ) -> Result<(User, PasswordResetToken), AuthError> {
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        let user = self
            .store
            .find_user_by_email(&payload.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token()?;
        let record = self.store.upsert_reset_token(&user.email, &token).await?;
        info!(user_id = user.id, "password reset requested");
        Ok((user, record))
    }

    /// Check a reset link. Absent, cleared, wrong and expired tokens all
    /// yield `ResetTokenNotFound`.
    pub async fn validate_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<PasswordResetToken, AuthError> {
        let payload = ValidateResetTokenPayload {
            email: email.to_string(),
            token: token.to_string(),
        };
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        let record = self
            .store
            .find_reset_token(email)
            .await?
            .ok_or(AuthError::ResetTokenNotFound)?;
        if !check_reset_token(&record, token, Utc::now()) {
            return Err(AuthError::ResetTokenNotFound);
        }
        Ok(record)
    }

    /// Set a new password through a valid reset token.
    ///
    /// A disabled account fails like a login would and keeps its token.
    #[instrument(skip_all, fields(email = %payload.email))]
    pub async fn submit_reset_password(
        &self,
        payload: &ResetPasswordPayload,
    ) -> Result<User, AuthError> {
        let errors = payload.validate(&self.validator);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        self.validate_reset_token(&payload.email, &payload.token)
            .await?;
        let user = self
            .store
            .find_user_by_email(&payload.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.disabled {
            return Err(login_failed(LoginFailure::Disabled));
        }

        let hash = hash_password(&payload.password)?;
        let updated = self
            .store
            .reset_password(&payload.email, &payload.token, &hash)
            .await?;
        info!(user_id = updated.id, "password reset completed");
        Ok(updated)
    }
}
