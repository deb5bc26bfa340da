// src/models/chat.rs

//! Chat wire data structures.

use serde::Serialize;

/// A chat participant from a `users` snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatUser {
    /// Server-assigned user id
    pub id: String,

    pub name: String,

    /// Profile link, when the server provides one
    pub url: Option<String>,
}

/// A single chat message from a `msgs` list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned message id; identity for deduplication
    pub id: String,

    /// Sender display name, absent on system messages
    pub user: Option<String>,

    /// Message body as delivered (may contain markup)
    pub message: String,

    /// Server timestamp, when present
    pub timestamp: Option<i64>,
}

/// Fan-out payload for chat listeners: what changed since the last poll.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatAction {
    /// Full replacement snapshot of active users, when the server sent one
    pub new_users: Option<Vec<ChatUser>>,

    /// Newly-seen messages, already deduplicated by message id
    pub new_messages: Vec<ChatMessage>,
}

impl ChatAction {
    /// True when the action carries neither users nor messages.
    pub fn is_empty(&self) -> bool {
        self.new_users.is_none() && self.new_messages.is_empty()
    }
}
