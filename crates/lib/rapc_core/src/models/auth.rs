//! Authentication domain models.
//!
//! `User` is serialized with camelCase field names because it is returned
//! as-is by the JSON API; the database id and password hash never leave the
//! server.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Audit name recorded for rows created by the system itself.
pub const SYSTEM_USERNAME: &str = "SYSTEM";

/// Domain user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "userName")]
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub password_must_change: bool,
    pub disabled: bool,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Values required to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub password_must_change: bool,
    pub is_guest: bool,
    pub created_by: String,
}

/// Outstanding password reset request. One row per email.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub email: String,
    #[serde(skip)]
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// JWT claims embedded in identity tokens.
///
/// Wire shape: `{"id": 7, "userName": "alice", "email": "alice@x.com", "exp": 1700000000}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id. Issued as an integer; any integral JSON number is accepted on decode.
    #[serde(deserialize_with = "deserialize_claim_id")]
    pub id: i64,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub email: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

fn deserialize_claim_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    claim_id_from_number(&number)
        .ok_or_else(|| de::Error::custom(format!("claim id {number} is not an integral value")))
}

/// Convert a decoded JSON number into a user id, comparing by value.
///
/// `7`, `7.0` and `7e0` all yield `Some(7)`; `7.5` yields `None`.
pub fn claim_id_from_number(number: &serde_json::Number) -> Option<i64> {
    if let Some(v) = number.as_i64() {
        return Some(v);
    }
    if let Some(v) = number.as_u64() {
        return i64::try_from(v).ok();
    }
    let v = number.as_f64()?;
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}
