//! Protocol Sessions
//!
//! Per-connection state: the negotiated protocol version and the
//! transport the connection arrived on. Sessions are created at
//! connection establishment, removed at disconnect, and never shared
//! across connections.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Which transport a session arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Stdio,
    Rpc,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportKind::Http => "http",
            TransportKind::Stdio => "stdio",
            TransportKind::Rpc => "rpc",
        };
        write!(f, "{}", name)
    }
}

/// Per-connection protocol state.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolSession {
    pub id: String,
    pub negotiated_version: String,
    pub transport: TransportKind,
    pub created_at: DateTime<Utc>,
}

/// Concurrent tracker of live sessions.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: DashMap<String, ProtocolSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session, returning its generated id.
    pub fn open(&self, negotiated_version: impl Into<String>, transport: TransportKind) -> String {
        let id = Uuid::new_v4().to_string();
        let session = ProtocolSession {
            id: id.clone(),
            negotiated_version: negotiated_version.into(),
            transport,
            created_at: Utc::now(),
        };
        tracing::info!(
            session_id = %id,
            version = %session.negotiated_version,
            transport = %transport,
            "Session opened"
        );
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Option<ProtocolSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Close a session at disconnect.
    pub fn close(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            tracing::info!(session_id = %id, "Session closed");
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let tracker = SessionTracker::new();
        let id = tracker.open("0.9.0", TransportKind::Stdio);

        let session = tracker.get(&id).unwrap();
        assert_eq!(session.negotiated_version, "0.9.0");
        assert_eq!(session.transport, TransportKind::Stdio);

        tracker.close(&id);
        assert!(tracker.get(&id).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let tracker = SessionTracker::new();
        let a = tracker.open("0.8.1", TransportKind::Http);
        let b = tracker.open("0.9.0", TransportKind::Http);

        assert_ne!(a, b);
        assert_eq!(tracker.len(), 2);

        tracker.close(&a);
        assert!(tracker.get(&b).is_some());
    }
}
