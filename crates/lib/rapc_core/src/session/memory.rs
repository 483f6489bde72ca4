//! In-process session backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::{SessionBackend, SessionError};

/// Sessions kept in a concurrent map. Expired entries are dropped on read
/// and by [`SessionBackend::purge_expired`].
#[derive(Default)]
pub struct MemorySessionBackend {
    sessions: DashMap<String, (String, DateTime<Utc>)>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn load(&self, id: &str) -> Result<Option<String>, SessionError> {
        let now = Utc::now();
        let expired = match self.sessions.get(id) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(id);
        }
        Ok(None)
    }

    async fn save(&self, id: &str, data: &str, max_age: Duration) -> Result<(), SessionError> {
        let expires_at = Utc::now()
            .checked_add_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sessions
            .insert(id.to_string(), (data.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
