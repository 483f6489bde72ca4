//! Out-of-band delivery of reset links and welcome messages.
//!
//! Mail delivery is not part of this server; the default notifier writes to
//! the log so an operator can relay the link.

use async_trait::async_trait;
use rapc_core::models::auth::User;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use url::Url;

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid link: {0}")]
    Link(#[from] url::ParseError),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the password-reset link to `user`.
    async fn password_reset(&self, user: &User, link: &Url) -> Result<(), NotifyError>;

    /// Tell a newly created user their initial password.
    async fn welcome(&self, user: &User, password: &str, login: &Url) -> Result<(), NotifyError>;
}

/// `APP_URL` as a directory, so relative joins keep any path prefix.
fn base_url(config: &ApiConfig) -> Result<Url, NotifyError> {
    let mut base = Url::parse(&config.app_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Link to the reset page for `email` and `token`.
pub fn reset_link(config: &ApiConfig, email: &str, token: &str) -> Result<Url, NotifyError> {
    let mut url = base_url(config)?.join("reset-password")?;
    url.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("token", token);
    Ok(url)
}

pub fn login_link(config: &ApiConfig) -> Result<Url, NotifyError> {
    Ok(base_url(config)?.join("login")?)
}

/// Writes notifications to the log. Passwords are never logged.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn password_reset(&self, user: &User, link: &Url) -> Result<(), NotifyError> {
        info!(email = %user.email, %link, "password reset link issued");
        Ok(())
    }

    async fn welcome(&self, user: &User, _password: &str, login: &Url) -> Result<(), NotifyError> {
        info!(
            email = %user.email,
            username = %user.username,
            %login,
            "account created; initial password withheld from log"
        );
        Ok(())
    }
}

/// A delivered notification, as seen by `RecordingNotifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PasswordReset { email: String, link: String },
    Welcome { email: String, password: String },
}

/// Keeps notifications in memory instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn password_reset(&self, user: &User, link: &Url) -> Result<(), NotifyError> {
        self.sent.lock().await.push(Notification::PasswordReset {
            email: user.email.clone(),
            link: link.to_string(),
        });
        Ok(())
    }

    async fn welcome(&self, user: &User, password: &str, _login: &Url) -> Result<(), NotifyError> {
        self.sent.lock().await.push(Notification::Welcome {
            email: user.email.clone(),
            password: password.to_string(),
        });
        Ok(())
    }
}
