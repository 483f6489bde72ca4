//! API server configuration.

use std::str::FromStr;

use chrono::Duration;
use rapc_core::auth::bootstrap::{FirstUser, SeedSettings};
use rapc_core::auth::jwt::{JwtSettings, resolve_jwt_secret};
use rapc_core::auth::{AuthSettings, GuestSettings};
use tracing::warn;

/// Longest accepted access token lifetime, in minutes (one year).
pub const MAX_JWT_EXPIRY_MINUTES: i64 = 365 * 24 * 60;
/// Longest accepted remember-me lifetime, in days.
pub const MAX_JWT_REMEMBER_DAYS: i64 = 3650;
/// Longest accepted session lifetime, in seconds.
pub const MAX_SESSION_AGE_SECS: i64 = MAX_JWT_REMEMBER_DAYS * 24 * 60 * 60;

const DEFAULT_SESSION_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Public base URL used in links sent to users.
    pub app_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub jwt_remember_days: i64,
    pub enable_guest_login: bool,
    pub guest_email: String,
    pub guest_password: String,
    /// Lifetime of a server-side session and its cookie.
    pub session_max_age_secs: i64,
    /// Mark cookies `Secure` (HTTPS only).
    pub cookie_secure: bool,
    /// Include internal error details in error responses.
    pub enable_debug: bool,
    /// Account seeded when no active user exists.
    pub first_user: Option<FirstUser>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                    | Default                            |
    /// |-----------------------------|------------------------------------|
    /// | `BIND_ADDR`                 | `127.0.0.1:3100`                   |
    /// | `DATABASE_URL`              | `postgres://localhost:5432/rapc`   |
    /// | `APP_URL`                   | `http://localhost:3100`            |
    /// | `JWT_SECRET`                | generated & persisted to file      |
    /// | `JWT_EXPIRATION_IN_MINUTES` | `60`                               |
    /// | `JWT_REMEMBER_IN_DAYS`      | `30`                               |
    /// | `ENABLE_GUEST_LOGIN`        | `false`                            |
    /// | `GUEST_EMAIL`               | empty                              |
    /// | `GUEST_PASSWORD`            | empty                              |
    /// | `SESSION_MAX_AGE_SECS`      | `604800` (7 days)                  |
    /// | `COOKIE_SECURE`             | `false`                            |
    /// | `ENABLE_DEBUG`              | `false`                            |
    /// | `FIRST_USER_USERNAME`       | `admin`                            |
    /// | `FIRST_USER_FULL_NAME`      | `Administrator`                    |
    /// | `FIRST_USER_EMAIL`          | unset (no seeding)                 |
    /// | `FIRST_USER_PASSWORD`       | unset (no seeding)                 |
    ///
    /// Durations must be positive and at most the matching `MAX_*` constant;
    /// anything else is logged and replaced by the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let string_or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.into());

        let first_user = match (var("FIRST_USER_EMAIL"), var("FIRST_USER_PASSWORD")) {
            (Some(email), Some(password)) => Some(FirstUser {
                username: string_or("FIRST_USER_USERNAME", "admin"),
                full_name: string_or("FIRST_USER_FULL_NAME", "Administrator"),
                email,
                password,
            }),
            _ => None,
        };

        Self {
            bind_addr: string_or("BIND_ADDR", "127.0.0.1:3100"),
            pg_connection_url: string_or("DATABASE_URL", "postgres://localhost:5432/rapc"),
            app_url: string_or("APP_URL", "http://localhost:3100"),
            jwt_secret: var("JWT_SECRET").unwrap_or_else(resolve_jwt_secret),
            jwt_expiry_minutes: bounded_or(
                &var,
                "JWT_EXPIRATION_IN_MINUTES",
                60,
                MAX_JWT_EXPIRY_MINUTES,
            ),
            jwt_remember_days: bounded_or(&var, "JWT_REMEMBER_IN_DAYS", 30, MAX_JWT_REMEMBER_DAYS),
            enable_guest_login: parse_or(&var, "ENABLE_GUEST_LOGIN", false),
            guest_email: string_or("GUEST_EMAIL", ""),
            guest_password: string_or("GUEST_PASSWORD", ""),
            session_max_age_secs: bounded_or(
                &var,
                "SESSION_MAX_AGE_SECS",
                DEFAULT_SESSION_AGE_SECS,
                MAX_SESSION_AGE_SECS,
            ),
            cookie_secure: parse_or(&var, "COOKIE_SECURE", false),
            enable_debug: parse_or(&var, "ENABLE_DEBUG", false),
            first_user,
        }
    }

    /// Settings for the core auth service.
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt: JwtSettings {
                secret: self.jwt_secret.clone(),
                expiry_minutes: self.jwt_expiry_minutes,
                remember_days: self.jwt_remember_days,
            },
            guest: GuestSettings {
                enabled: self.enable_guest_login,
                email: self.guest_email.clone(),
                password: self.guest_password.clone(),
            },
        }
    }

    pub fn seed_settings(&self) -> SeedSettings {
        SeedSettings {
            first_user: self.first_user.clone(),
        }
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::try_seconds(self.session_max_age_secs)
            .filter(|age| *age > Duration::zero())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_SESSION_AGE_SECS))
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "ignoring unparsable value");
            default
        }),
        None => default,
    }
}

/// Parse a duration count that must lie in `1..=max`.
fn bounded_or<F>(var: &F, name: &str, default: i64, max: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(var, name, default);
    if (1..=max).contains(&value) {
        value
    } else {
        warn!(variable = name, value, max, "ignoring out-of-range value");
        default
    }
}
