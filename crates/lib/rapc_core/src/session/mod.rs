//! Server-side sessions.
//!
//! A session is a small map of typed values persisted as JSON under an
//! opaque id. The web layer carries the id in a cookie; everything else
//! stays on the server.

pub mod helpers;
pub mod memory;
pub mod pg;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::AuthError;

pub use helpers::{
    logout, save_token, set_error, set_info, set_prev_route, take_error, take_info,
    take_prev_route, validate_stored_token,
};

/// Key holding the identity token.
pub const TOKEN_KEY: &str = "token";
/// Key holding a one-shot error for the next page.
pub const ERROR_KEY: &str = "error";
/// Key holding one-shot informational messages.
pub const INFO_KEY: &str = "info";
/// Key holding the route to return to after login.
pub const PREV_ROUTE_KEY: &str = "prevRoute";

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        AuthError::Internal(format!("session: {e}"))
    }
}

/// Error shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

/// Informational message(s) shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlashInfo {
    Single(String),
    Many(Vec<String>),
}

impl FlashInfo {
    pub fn messages(&self) -> Vec<String> {
        match self {
            FlashInfo::Single(m) => vec![m.clone()],
            FlashInfo::Many(ms) => ms.clone(),
        }
    }
}

/// A value stored in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SessionValue {
    Token(String),
    Error(FlashError),
    Info(FlashInfo),
    PrevRoute { method: String, path: String },
}

impl SessionValue {
    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionValue::Token(_) => "token",
            SessionValue::Error(_) => "error",
            SessionValue::Info(_) => "info",
            SessionValue::PrevRoute { .. } => "prevRoute",
        }
    }
}

/// Where serialized sessions live.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Fetch the payload of an unexpired session.
    async fn load(&self, id: &str) -> Result<Option<String>, SessionError>;

    /// Create or replace a session payload, valid for `max_age` from now.
    async fn save(&self, id: &str, data: &str, max_age: Duration) -> Result<(), SessionError>;

    async fn delete(&self, id: &str) -> Result<(), SessionError>;

    /// Delete every expired session, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

/// Opens sessions against a backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, max_age: Duration) -> Self {
        Self { backend, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Sweep expired sessions out of the backend.
    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let removed = self.backend.purge_expired().await?;
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        Ok(removed)
    }

    /// Open the session with `id`, or start an empty one.
    ///
    /// Missing, expired and undecodable sessions are replaced by a fresh
    /// session with a new id. Backend failures are logged, never returned.
    pub async fn load(&self, id: Option<&str>) -> Session {
        if let Some(id) = id {
            match self.backend.load(id).await {
                Ok(Some(data)) => {
                    match serde_json::from_str::<HashMap<String, SessionValue>>(&data) {
                        Ok(values) => {
                            return Session {
                                id: id.to_string(),
                                values,
                                persisted: true,
                                destroyed: false,
                                backend: self.backend.clone(),
                                max_age: self.max_age,
                            };
                        }
                        Err(e) => warn!(error = %e, "discarding undecodable session"),
                    }
                }
                Ok(None) => debug!("session not found or expired"),
                Err(e) => warn!(error = %e, "failed to read session"),
            }
        }
        self.create()
    }

    fn create(&self) -> Session {
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            values: HashMap::new(),
            persisted: false,
            destroyed: false,
            backend: self.backend.clone(),
            max_age: self.max_age,
        }
    }
}

/// An open session. Every mutation is written through to the backend.
pub struct Session {
    id: String,
    values: HashMap<String, SessionValue>,
    persisted: bool,
    destroyed: bool,
    backend: Arc<dyn SessionBackend>,
    max_age: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("persisted", &self.persisted)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the session exists in the backend.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.values.get(key)
    }

    pub async fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError> {
        self.values.insert(key.to_string(), value);
        self.persist().await
    }

    pub async fn remove(&mut self, key: &str) -> Result<Option<SessionValue>, SessionError> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Read a value and delete it in one step.
    pub async fn flash(&mut self, key: &str) -> Result<Option<SessionValue>, SessionError> {
        self.remove(key).await
    }

    /// Delete the session from the backend and forget its values.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        self.values.clear();
        self.destroyed = true;
        if self.persisted {
            self.backend.delete(&self.id).await?;
            self.persisted = false;
        }
        Ok(())
    }

    /// Move the session to a fresh id, keeping its values.
    ///
    /// The old id is deleted from the backend so it can no longer be
    /// presented. Call this whenever the session gains privileges.
    pub async fn regenerate(&mut self) -> Result<(), SessionError> {
        if self.persisted {
            self.backend.delete(&self.id).await?;
            self.persisted = false;
        }
        self.id = uuid::Uuid::new_v4().to_string();
        self.destroyed = false;
        if !self.values.is_empty() {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&mut self) -> Result<(), SessionError> {
        let data = serde_json::to_string(&self.values)?;
        self.backend.save(&self.id, &data, self.max_age).await?;
        self.persisted = true;
        self.destroyed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::MemorySessionBackend;

    fn store() -> (SessionStore, Arc<MemorySessionBackend>) {
        let backend = Arc::new(MemorySessionBackend::new());
        (SessionStore::new(backend.clone(), Duration::hours(1)), backend)
    }

    #[test]
    fn values_serialize_tagged() {
        let value = SessionValue::PrevRoute {
            method: "GET".into(),
            path: "/dashboard".into(),
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "prevRoute", "value": {"method": "GET", "path": "/dashboard"}})
        );

        let info: SessionValue =
            serde_json::from_str(r#"{"type":"info","value":["a","b"]}"#).unwrap();
        assert_eq!(
            info,
            SessionValue::Info(FlashInfo::Many(vec!["a".into(), "b".into()]))
        );
    }

    #[tokio::test]
    async fn missing_id_starts_fresh_session() {
        let (store, _) = store();
        let session = store.load(None).await;
        assert!(!session.is_persisted());
        assert!(session.get(TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn values_survive_reload() {
        let (store, _) = store();
        let mut session = store.load(None).await;
        session
            .set(TOKEN_KEY, SessionValue::Token("jwt".into()))
            .await
            .unwrap();
        let id = session.id().to_string();

        let reloaded = store.load(Some(&id)).await;
        assert_eq!(reloaded.id(), id);
        assert_eq!(reloaded.get(TOKEN_KEY), Some(&SessionValue::Token("jwt".into())));
    }

    #[tokio::test]
    async fn flash_is_read_once() {
        let (store, _) = store();
        let mut session = store.load(None).await;
        session
            .set(INFO_KEY, SessionValue::Info(FlashInfo::Single("hi".into())))
            .await
            .unwrap();
        let id = session.id().to_string();

        let mut next = store.load(Some(&id)).await;
        assert!(next.flash(INFO_KEY).await.unwrap().is_some());
        let mut after = store.load(Some(&id)).await;
        assert!(after.flash(INFO_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_payload_is_replaced() {
        let (store, backend) = store();
        backend
            .save("broken", "{not json", Duration::hours(1))
            .await
            .unwrap();
        let session = store.load(Some("broken")).await;
        assert_ne!(session.id(), "broken");
        assert!(!session.is_persisted());
    }

    #[tokio::test]
    async fn regenerate_moves_values_to_new_id() {
        let (store, backend) = store();
        let mut session = store.load(None).await;
        session
            .set(
                PREV_ROUTE_KEY,
                SessionValue::PrevRoute {
                    method: "GET".into(),
                    path: "/dashboard".into(),
                },
            )
            .await
            .unwrap();
        let old_id = session.id().to_string();

        session.regenerate().await.unwrap();
        assert_ne!(session.id(), old_id);
        assert!(session.is_persisted());
        assert!(backend.load(&old_id).await.unwrap().is_none());

        let reloaded = store.load(Some(session.id())).await;
        assert!(reloaded.get(PREV_ROUTE_KEY).is_some());
    }

    #[tokio::test]
    async fn regenerate_empty_session_stays_unsaved() {
        let (store, backend) = store();
        let mut session = store.load(None).await;
        let old_id = session.id().to_string();
        session.regenerate().await.unwrap();
        assert_ne!(session.id(), old_id);
        assert!(!session.is_persisted());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn store_purges_expired_sessions() {
        let (store, backend) = store();
        backend.save("stale", "{}", Duration::seconds(-5)).await.unwrap();
        backend.save("fresh", "{}", Duration::hours(1)).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn destroy_removes_backend_record() {
        let (store, backend) = store();
        let mut session = store.load(None).await;
        session
            .set(TOKEN_KEY, SessionValue::Token("jwt".into()))
            .await
            .unwrap();
        let id = session.id().to_string();
        session.destroy().await.unwrap();
        assert!(session.is_destroyed());
        assert!(backend.load(&id).await.unwrap().is_none());
        assert_ne!(store.load(Some(&id)).await.id(), id);
    }
}
