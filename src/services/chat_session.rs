// src/services/chat_session.rs

//! Per-room registry of chat connections.
//!
//! A chat session owns the chat-index link identity and at most one
//! connection per profile. Events drained from the connections keep their
//! per-connection arrival order; there is no ordering guarantee across
//! connections.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ProfileStore;
use crate::services::connection::{ChatConnection, ChatEvent, FetchTarget};
use crate::services::session::{ResponseBody, Session};

/// All connections of one chat room.
pub struct ChatSession {
    link: String,
    silent: bool,
    connections: HashMap<String, ChatConnection>,
}

impl ChatSession {
    pub fn new(link: impl Into<String>, silent: bool) -> Self {
        Self {
            link: link.into(),
            silent,
            connections: HashMap::new(),
        }
    }

    /// The chat-index link. Stable identity of this session.
    pub fn link(&self) -> &str {
        &self.link
    }

    /// Whether the owning lesson suppresses actual message sends.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether a live (non-terminal) connection exists for the account.
    pub fn has_live_connection(&self, username: &str) -> bool {
        self.connections
            .get(username)
            .is_some_and(|conn| conn.is_alive())
    }

    pub fn connection(&self, username: &str) -> Option<&ChatConnection> {
        self.connections.get(username)
    }

    pub fn connection_mut(&mut self, username: &str) -> Option<&mut ChatConnection> {
        self.connections.get_mut(username)
    }

    /// Create a connection for the account, or return the existing one.
    pub fn create_connection(&mut self, username: &str) -> &mut ChatConnection {
        self.connections
            .entry(username.to_string())
            .or_insert_with(|| ChatConnection::new(username, self.link.clone()))
    }

    /// Close and drop the account's connection, if present.
    pub fn destroy_connection(&mut self, username: &str) {
        if let Some(mut connection) = self.connections.remove(username) {
            connection.close();
        }
    }

    /// Tick every connection's poll loop and sweep dead ones. Removal is
    /// two-phase (mark, then remove) so the sweep never races the
    /// iteration.
    pub fn update(
        &mut self,
        now: DateTime<Utc>,
        session: &mut Session,
        profiles: &ProfileStore,
    ) -> Vec<ChatEvent> {
        let mut events = Vec::new();

        for connection in self.connections.values_mut() {
            if let Some(profile) = profiles.get(connection.username()) {
                if profile.valid {
                    session.select_profile(profile);
                    connection.update(now, session);
                }
            }
            events.extend(connection.take_events());
        }

        let dead: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, conn)| !conn.is_alive())
            .map(|(username, _)| username.clone())
            .collect();
        for username in dead {
            self.connections.remove(&username);
        }

        events
    }

    /// Route a completed fetch to its connection. Replies for unknown or
    /// superseded connections are discarded.
    pub fn handle_reply(
        &mut self,
        now: DateTime<Utc>,
        session: &mut Session,
        profiles: &ProfileStore,
        target: &FetchTarget,
        outcome: Result<ResponseBody>,
    ) -> Vec<ChatEvent> {
        let Some(connection) = self.connections.get_mut(&target.username) else {
            log::debug!(
                "Discarding {:?} reply for unknown connection '{}'",
                target.stage,
                target.username
            );
            return Vec::new();
        };
        if connection.id() != target.connection_id {
            log::debug!(
                "Discarding {:?} reply for superseded connection '{}'",
                target.stage,
                target.username
            );
            return Vec::new();
        }

        if let Some(profile) = profiles.get(&target.username) {
            session.select_profile(profile);
        }
        connection.handle_reply(now, session, target.stage, outcome);
        connection.take_events()
    }

    /// Close every connection and empty the registry.
    pub fn close(&mut self) {
        for connection in self.connections.values_mut() {
            connection.close();
        }
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::models::{HttpConfig, Profile};
    use crate::services::connection::FetchStage;

    use super::*;

    fn test_session() -> Session {
        let (tx, rx) = mpsc::unbounded_channel();
        std::mem::forget(rx);
        Session::new(&HttpConfig::default(), tx).unwrap()
    }

    fn profiles() -> ProfileStore {
        ProfileStore::from_profiles(vec![Profile::new("alice", "pw")]).unwrap()
    }

    const LINK: &str = "https://eos.example.edu/mod/chat/gui_ajax/index.php?id=42";

    #[test]
    fn test_create_connection_is_idempotent() {
        let mut chat = ChatSession::new(LINK, false);
        let id = chat.create_connection("alice").id();
        assert_eq!(chat.create_connection("alice").id(), id);
        assert_eq!(chat.connection_count(), 1);
    }

    #[test]
    fn test_stale_reply_is_discarded() {
        let mut chat = ChatSession::new(LINK, false);
        let stale_id = chat.create_connection("alice").id();
        chat.destroy_connection("alice");
        let fresh_id = chat.create_connection("alice").id();
        assert_ne!(stale_id, fresh_id);

        let target = FetchTarget {
            connection_id: stale_id,
            username: "alice".to_string(),
            chat_link: LINK.to_string(),
            stage: FetchStage::Update,
        };
        let events = chat.handle_reply(
            Utc::now(),
            &mut test_session(),
            &profiles(),
            &target,
            Ok(ResponseBody::Json(json!({"msgs": [{"id": "1"}]}))),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_update_sweeps_dead_connections() {
        let mut chat = ChatSession::new(LINK, false);
        chat.create_connection("alice");

        // kill it through a routed transport error
        let target = FetchTarget {
            connection_id: chat.connection_mut("alice").unwrap().id(),
            username: "alice".to_string(),
            chat_link: LINK.to_string(),
            stage: FetchStage::Index,
        };
        let events = chat.handle_reply(
            Utc::now(),
            &mut test_session(),
            &profiles(),
            &target,
            Err(crate::error::AppError::Status {
                status: 503,
                url: LINK.to_string(),
            }),
        );
        assert_eq!(events.len(), 1);
        assert!(!chat.has_live_connection("alice"));

        let events = chat.update(Utc::now(), &mut test_session(), &profiles());
        assert!(events.is_empty());
        assert_eq!(chat.connection_count(), 0);
    }

    #[test]
    fn test_close_empties_registry() {
        let mut chat = ChatSession::new(LINK, false);
        chat.create_connection("alice");
        chat.create_connection("bob");
        chat.close();
        assert_eq!(chat.connection_count(), 0);
    }
}
