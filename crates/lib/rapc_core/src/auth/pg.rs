//! Postgres credential store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::reset::RESET_TOKEN_TTL_SECS;
use super::store::CredentialStore;
use crate::models::auth::{NewUser, PasswordResetToken, User};

const USER_COLUMNS: &str = "id, username, full_name, email, password_hash, \
     password_must_change, disabled, is_guest, created_at, created_by, updated_at, updated_by";

const RESET_COLUMNS: &str = "email, token, created_at, updated_at";

/// Credential store backed by the `users` and `password_reset_tokens` tables.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn unique-constraint violations on `users` into `Conflict`.
fn map_insert_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("users_username_key") => {
                return AuthError::Conflict("username already exists".into());
            }
            Some("users_email_key") => return AuthError::Conflict("email already exists".into()),
            _ => {}
        }
    }
    AuthError::DbError(e)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (username, full_name, email, password_hash, password_must_change, is_guest, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.username)
        .bind(&new_user.full_name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.password_must_change)
        .bind(new_user.is_guest)
        .bind(&new_user.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &str,
        must_change: bool,
        updated_by: &str,
    ) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET password_hash = $2, password_must_change = $3, updated_by = $4, updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(password_hash)
        .bind(must_change)
        .bind(updated_by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::UserNotFound)
    }

    async fn has_active_member(&self) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE NOT disabled AND NOT is_guest)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn has_guest(&self) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE is_guest)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn upsert_reset_token(
        &self,
        email: &str,
        token: &str,
    ) -> Result<PasswordResetToken, AuthError> {
        let record = sqlx::query_as::<_, PasswordResetToken>(&format!(
            "INSERT INTO password_reset_tokens (email, token) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET token = EXCLUDED.token, updated_at = now() \
             RETURNING {RESET_COLUMNS}"
        ))
        .bind(email)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetToken>, AuthError> {
        let record = sqlx::query_as::<_, PasswordResetToken>(&format!(
            "SELECT {RESET_COLUMNS} FROM password_reset_tokens WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn reset_password(
        &self,
        email: &str,
        token: &str,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-clear; a token is spent at most once.
        let fresh_since = Utc::now() - Duration::seconds(RESET_TOKEN_TTL_SECS);
        let consumed = sqlx::query(
            "UPDATE password_reset_tokens SET token = '', updated_at = now() \
             WHERE email = $1 AND token = $2 AND token <> '' AND updated_at >= $3",
        )
        .bind(email)
        .bind(token)
        .bind(fresh_since)
        .execute(&mut *tx)
        .await?;
        if consumed.rows_affected() == 0 {
            return Err(AuthError::ResetTokenNotFound);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET password_hash = $2, password_must_change = FALSE, updated_by = username, updated_at = now() \
             WHERE email = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        tx.commit().await?;
        Ok(user)
    }
}
