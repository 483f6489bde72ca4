//! JWT token generation and verification.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

use super::AuthError;
use crate::models::auth::{TokenClaims, User};

/// Signing secret and lifetimes for identity tokens.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    /// Lifetime of a regular token.
    pub expiry_minutes: i64,
    /// Lifetime of a "remember me" token.
    pub remember_days: i64,
}

impl JwtSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiry_minutes: 60,
            remember_days: 30,
        }
    }

    fn lifetime(&self, remember: bool) -> Result<Duration, AuthError> {
        let lifetime = if remember {
            Duration::try_days(self.remember_days)
        } else {
            Duration::try_minutes(self.expiry_minutes)
        };
        lifetime
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".into()))
    }
}

/// Sign an HS256 token carrying the user's id, username and email.
pub fn issue_token(user: &User, remember: bool, settings: &JwtSettings) -> Result<String, AuthError> {
    let claims = TokenClaims {
        id: user.id,
        user_name: user.username.clone(),
        email: user.email.clone(),
        exp: Utc::now()
            .checked_add_signed(settings.lifetime(remember)?)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".into()))?
            .timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify signature and expiry, returning the claims.
///
/// Bad signatures, expired tokens and malformed claims all map to
/// `TokenInvalid`.
pub fn decode_token(token: &str, secret: &str) -> Result<TokenClaims, AuthError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::TokenInvalid(e.to_string()))
}

/// Resolve the JWT secret: env var `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    resolve_jwt_secret_at(&jwt_secret_path())
}

/// Read the secret stored at `path`, generating and persisting one if the
/// file is missing or empty.
pub fn resolve_jwt_secret_at(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(path, &secret) {
        Ok(()) => info!(path = %path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not persist JWT secret"),
    }
    secret
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rapc")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 42,
            username: "alice".into(),
            full_name: "Alice".into(),
            email: "alice@x.com".into(),
            password_hash: String::new(),
            password_must_change: false,
            disabled: false,
            is_guest: false,
            created_at: now,
            created_by: "SYSTEM".into(),
            updated_at: now,
            updated_by: "SYSTEM".into(),
        }
    }

    fn sign(value: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &value,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_decodes_to_user_claims() {
        let settings = JwtSettings::new("test-secret");
        let token = issue_token(&user(), false, &settings).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.id, 42);
        assert_eq!(claims.user_name, "alice");
        assert_eq!(claims.email, "alice@x.com");
    }

    #[test]
    fn expiry_follows_configured_lifetimes() {
        let settings = JwtSettings {
            secret: "s".into(),
            expiry_minutes: 15,
            remember_days: 3,
        };
        let short = decode_token(&issue_token(&user(), false, &settings).unwrap(), "s").unwrap();
        let long = decode_token(&issue_token(&user(), true, &settings).unwrap(), "s").unwrap();
        let now = Utc::now().timestamp();
        assert!((short.exp - (now + 15 * 60)).abs() <= 5, "{}", short.exp - now);
        assert!((long.exp - (now + 3 * 24 * 60 * 60)).abs() <= 5, "{}", long.exp - now);
    }

    #[test]
    fn unrepresentable_lifetime_is_internal_error() {
        for (expiry_minutes, remember_days, remember) in [
            (60, 10_000_000_000, true),
            (i64::MAX, 30, false),
            (0, 30, false),
            (60, -1, true),
        ] {
            let settings = JwtSettings {
                secret: "s".into(),
                expiry_minutes,
                remember_days,
            };
            assert!(matches!(
                issue_token(&user(), remember, &settings),
                Err(AuthError::Internal(_))
            ));
        }
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = issue_token(&user(), false, &JwtSettings::new("a")).unwrap();
        assert!(matches!(decode_token(&token, "b"), Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn expired_token_is_invalid() {
        let exp = Utc::now().timestamp() - 3600;
        let token = sign(
            json!({"id": 1, "userName": "a", "email": "a@x.com", "exp": exp}),
            "s",
        );
        assert!(matches!(decode_token(&token, "s"), Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn missing_email_claim_is_invalid() {
        let exp = Utc::now().timestamp() + 3600;
        let token = sign(json!({"id": 1, "userName": "a", "exp": exp}), "s");
        assert!(matches!(decode_token(&token, "s"), Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn float_id_claim_is_accepted() {
        let exp = Utc::now().timestamp() + 3600;
        let token = sign(
            json!({"id": 42.0, "userName": "alice", "email": "alice@x.com", "exp": exp}),
            "s",
        );
        assert_eq!(decode_token(&token, "s").unwrap().id, 42);
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            decode_token("not.a.jwt", "s"),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn secret_is_generated_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jwt-secret");
        let first = resolve_jwt_secret_at(&path);
        assert_eq!(first.len(), 64);
        let second = resolve_jwt_secret_at(&path);
        assert_eq!(first, second);
    }
}
