//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::AuthError;
use super::reset::check_reset_token;
use super::store::CredentialStore;
use crate::models::auth::{NewUser, PasswordResetToken, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    reset_tokens: HashMap<String, PasswordResetToken>,
    next_id: i64,
}

/// Credential store kept in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the `updated_at` of a stored reset token.
    pub async fn set_reset_token_updated_at(&self, email: &str, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.reset_tokens.get_mut(email) {
            Some(record) => {
                record.updated_at = at;
                true
            }
            None => false,
        }
    }

    /// Enable or disable a user by email.
    pub async fn set_disabled(&self, email: &str, disabled: bool) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                user.disabled = disabled;
                true
            }
            None => false,
        }
    }
}

impl Inner {
    fn set_password(
        &mut self,
        user_id: i64,
        password_hash: &str,
        must_change: bool,
        updated_by: &str,
    ) -> Result<User, AuthError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::UserNotFound)?;
        user.password_hash = password_hash.to_string();
        user.password_must_change = must_change;
        user.updated_by = updated_by.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut inner = self.inner.lock().await;
        if inner.users.iter().any(|u| u.username == new_user.username) {
            return Err(AuthError::Conflict("username already exists".into()));
        }
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(AuthError::Conflict("email already exists".into()));
        }
        inner.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_id,
            username: new_user.username,
            full_name: new_user.full_name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            password_must_change: new_user.password_must_change,
            disabled: false,
            is_guest: new_user.is_guest,
            created_at: now,
            created_by: new_user.created_by.clone(),
            updated_at: now,
            updated_by: new_user.created_by,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
        must_change: bool,
        updated_by: &str,
    ) -> Result<User, AuthError> {
        let mut inner = self.inner.lock().await;
        inner.set_password(user_id, password_hash, must_change, updated_by)
    }

    async fn has_active_member(&self) -> Result<bool, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().any(|u| !u.disabled && !u.is_guest))
    }

    async fn has_guest(&self) -> Result<bool, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().any(|u| u.is_guest))
    }

    async fn upsert_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<PasswordResetToken, AuthError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let record = inner
            .reset_tokens
            .entry(email.to_string())
            .and_modify(|r| {
                r.token = token.to_string();
                r.updated_at = now;
            })
            .or_insert_with(|| PasswordResetToken {
                email: email.to_string(),
                token: token.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn find_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetToken>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.reset_tokens.get(email).cloned())
    }

    async fn reset_password(
        &self,
        email: &str,
        token: &str,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let live = inner
            .reset_tokens
            .get(email)
            .is_some_and(|record| check_reset_token(record, token, now));
        if !live {
            return Err(AuthError::ResetTokenNotFound);
        }

        let (user_id, username) = inner
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| (u.id, u.username.clone()))
            .ok_or(AuthError::UserNotFound)?;
        let user = inner.set_password(user_id, password_hash, false, &username)?;
        if let Some(record) = inner.reset_tokens.get_mut(email) {
            record.token.clear();
            record.updated_at = now;
        }
        Ok(user)
    }
}
