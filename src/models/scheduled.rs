// src/models/scheduled.rs

//! Persisted scheduled-connection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One account's planned (or completed) join of a chat room.
///
/// The on-disk record is the source of truth for "already joined" across
/// restarts. Identity is the (username, join_at, chat_link) tuple, not
/// live object identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledRecord {
    /// Account username; re-resolved to a live profile each tick
    pub username: String,

    /// Chat index link the join belongs to
    pub chat_link: String,

    /// Randomized join instant
    pub join_at: DateTime<Utc>,

    /// Whether the join-time scripted action has already fired
    #[serde(default)]
    pub fired: bool,
}

impl ScheduledRecord {
    pub fn new(username: impl Into<String>, chat_link: impl Into<String>, join_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            chat_link: chat_link.into(),
            join_at,
            fired: false,
        }
    }

    /// Tuple identity across restarts.
    pub fn same_identity(&self, other: &ScheduledRecord) -> bool {
        self.username == other.username
            && self.chat_link == other.chat_link
            && self.join_at == other.join_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_identity_ignores_fired_flag() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let a = ScheduledRecord::new("alice", "https://eos/chat?id=1", at);
        let mut b = a.clone();
        b.fired = true;
        assert!(a.same_identity(&b));
    }

    #[test]
    fn test_identity_differs_on_join_time() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let a = ScheduledRecord::new("alice", "https://eos/chat?id=1", at);
        let b = ScheduledRecord::new("alice", "https://eos/chat?id=1", at + chrono::Duration::seconds(1));
        assert!(!a.same_identity(&b));
    }
}
