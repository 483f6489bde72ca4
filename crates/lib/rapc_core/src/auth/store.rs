//! Credential store abstraction.
//!
//! The auth service only talks to users and reset tokens through this trait.
//! `PgCredentialStore` backs production; `MemoryCredentialStore` backs tests
//! and the in-memory server mode.

use async_trait::async_trait;

use super::AuthError;
use crate::models::auth::{NewUser, PasswordResetToken, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Insert a user. A duplicate username or email yields `Conflict`.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Replace the password hash and must-change flag, returning the updated
    /// row. `UserNotFound` if the id does not exist.
    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
        must_change: bool,
        updated_by: &str,
    ) -> Result<User, AuthError>;

    /// Whether at least one enabled, non-guest user exists.
    async fn has_active_member(&self) -> Result<bool, AuthError>;

    /// Whether a guest user exists.
    async fn has_guest(&self) -> Result<bool, AuthError>;

    /// Create or replace the reset token for `email` in one atomic step.
    async fn upsert_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<PasswordResetToken, AuthError>;

    async fn find_reset_token(&self, email: &str)
    -> Result<Option<PasswordResetToken>, AuthError>;

    /// Consume the reset token of `email` and set a new password (clearing
    /// the must-change flag) in one atomic step.
    ///
    /// The token is compared and cleared under the same lock or transaction
    /// that writes the password, so a token is spent at most once.
    /// `ResetTokenNotFound` if `token` is not the live, unexpired token of
    /// `email`; `UserNotFound` if no user has that email. Nothing changes on
    /// error.
    async fn reset_password(
        &self,
        email: &str,
        token: &str,
        password_hash: &str,
    ) -> Result<User, AuthError>;
}
