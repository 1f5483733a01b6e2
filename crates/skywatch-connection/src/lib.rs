//! Thread-safe registry of live sensor sessions, indexed by connection id
//! and, secondarily, by zipcode.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry: maximum connections reached")]
    CapacityExceeded,

    #[error("registry: connection id {0} already registered")]
    DuplicateId(String),

    #[error("registry: connection id {0} not found")]
    NotFound(String),
}

/// Server-side state of one identified connection.
///
/// Identity fields are immutable after registration. The activity stamp has
/// its own lock so per-frame updates never contend on the registry's maps.
/// The session's token is the close path: cancelling it makes the reader
/// drop the socket.
pub struct Session {
    pub connection_id: String,
    pub zipcode: String,
    pub city: String,
    pub connected_at: DateTime<Utc>,
    last_heard: Mutex<Instant>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(connection_id: String, zipcode: String, city: String) -> Self {
        Self {
            connection_id,
            zipcode,
            city,
            connected_at: Utc::now(),
            last_heard: Mutex::new(Instant::now()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Record activity on the connection.
    pub fn touch(&self) {
        *self.last_heard.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn last_heard(&self) -> Instant {
        *self.last_heard.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request the connection be torn down. The reader owns the socket and
    /// closes it when it observes the cancellation.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub unique_zipcodes: usize,
    pub max_connections: usize,
}

#[derive(Default)]
struct Maps {
    sessions: HashMap<String, Arc<Session>>,
    by_zipcode: HashMap<String, Vec<String>>,
}

/// Live-session registry with a configurable capacity ceiling.
pub struct Registry {
    maps: RwLock<Maps>,
    max_connections: usize,
}

impl Registry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
            max_connections,
        }
    }

    /// Insert a session. Fails when the registry is at capacity or the id is
    /// already present; the caller acks an error and closes in both cases.
    pub fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());

        if maps.sessions.len() >= self.max_connections {
            return Err(RegistryError::CapacityExceeded);
        }
        if maps.sessions.contains_key(&session.connection_id) {
            return Err(RegistryError::DuplicateId(session.connection_id.clone()));
        }

        maps.by_zipcode
            .entry(session.zipcode.clone())
            .or_default()
            .push(session.connection_id.clone());
        maps.sessions
            .insert(session.connection_id.clone(), session);
        Ok(())
    }

    pub fn unregister(&self, connection_id: &str) -> Result<(), RegistryError> {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());

        let session = maps
            .sessions
            .remove(connection_id)
            .ok_or_else(|| RegistryError::NotFound(connection_id.to_string()))?;

        if let Some(ids) = maps.by_zipcode.get_mut(&session.zipcode) {
            ids.retain(|id| id != connection_id);
            if ids.is_empty() {
                maps.by_zipcode.remove(&session.zipcode);
            }
        }
        Ok(())
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<Session>> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.sessions.get(connection_id).cloned()
    }

    /// Connection ids currently registered for a zipcode. Returns a snapshot
    /// copy so callers never observe mid-mutation state.
    pub fn get_by_zipcode(&self, zipcode: &str) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.by_zipcode.get(zipcode).cloned().unwrap_or_default()
    }

    /// Stamp activity for a connection without taking the write lock.
    pub fn update_activity(&self, connection_id: &str) -> Result<(), RegistryError> {
        let session = self
            .get(connection_id)
            .ok_or_else(|| RegistryError::NotFound(connection_id.to_string()))?;
        session.touch();
        Ok(())
    }

    pub fn count(&self) -> usize {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.sessions.len()
    }

    /// Connections with no activity for longer than `timeout`.
    pub fn find_inactive(&self, timeout: Duration) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        maps.sessions
            .values()
            .filter(|s| now.duration_since(s.last_heard()) > timeout)
            .map(|s| s.connection_id.clone())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        RegistryStats {
            total_connections: maps.sessions.len(),
            unique_zipcodes: maps.by_zipcode.len(),
            max_connections: self.max_connections,
        }
    }
}

#[cfg(test)]
mod tests;
