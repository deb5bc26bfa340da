// src/services/connection.rs

//! Per-account chat connection: the protocol state machine.
//!
//! One connection drives one account through one chat room:
//!
//! ```text
//! Disconnected -> Connecting -> Configuring -> Polling -> Closed
//!                      \             \            \
//!                       +-----> Invalid <----------+   (absorbing)
//! ```
//!
//! `open()` fetches the chat landing page, the page parses into a
//! [`ChatRoomConfig`], an `init` call brings up the server-side session,
//! then the connection polls on the server-dictated ping period. Any
//! transport error, any payload carrying an `error` key, or a malformed
//! payload at any stage is terminal: the connection turns Invalid and the
//! error event fires exactly once. Reconnection is the coordinator's
//! business, by discarding and recreating the connection.
//!
//! All request traffic here is fire-and-forget via [`Session::spawn_fetch`];
//! replies land back through the engine and must be routed to
//! [`ChatConnection::handle_reply`] with the owning profile selected on the
//! session. Replies for a superseded connection id are discarded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ChatAction, ChatMessage, ChatUser};
use crate::services::chat_config::{self, ChatRoomConfig};
use crate::services::session::{ResponseBody, ResponseKind, Session};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Protocol state of a chat connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Configuring,
    Polling,
    Closed,
    Invalid,
}

/// Which protocol step a spawned fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// GET of the chat landing page
    Index,
    /// `action=init` POST
    Init,
    /// `action=update` POST
    Update,
    /// `action=chat` POST
    Send,
}

impl FetchStage {
    /// How the response body of this step is decoded.
    pub fn response_kind(self) -> ResponseKind {
        match self {
            Self::Index | Self::Send => ResponseKind::Text,
            Self::Init | Self::Update => ResponseKind::Json,
        }
    }
}

/// Routing token attached to every spawned chat fetch.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub connection_id: u64,
    pub username: String,
    pub chat_link: String,
    pub stage: FetchStage,
}

/// Event emitted by a connection, drained by its chat session.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The connection finished its handshake and is polling
    Connected { username: String },

    /// The connection died; fired exactly once per connection
    ConnectionError { username: String, message: String },

    /// New chat traffic (user snapshot and/or fresh messages)
    Action { username: String, action: ChatAction },
}

/// Decoded `update`-style response payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatUpdate {
    pub last_time: String,
    pub last_row: String,
    pub users: Option<Vec<ChatUser>>,
    pub messages: Vec<ChatMessage>,
}

/// One account's live link to one chat room.
pub struct ChatConnection {
    id: u64,
    username: String,
    chat_link: String,
    state: ConnectionState,
    config: Option<ChatRoomConfig>,
    last_time: String,
    last_row: String,
    seen_messages: HashSet<String>,
    last_ping: Option<DateTime<Utc>>,
    error_fired: bool,
    events: Vec<ChatEvent>,
}

impl ChatConnection {
    pub fn new(username: impl Into<String>, chat_link: impl Into<String>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            username: username.into(),
            chat_link: chat_link.into(),
            state: ConnectionState::Disconnected,
            config: None,
            last_time: String::new(),
            last_row: "0".to_string(),
            seen_messages: HashSet::new(),
            last_ping: None,
            error_fired: false,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn chat_link(&self) -> &str {
        &self.chat_link
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> Option<&ChatRoomConfig> {
        self.config.as_ref()
    }

    /// Whether the connection is in a non-terminal state.
    pub fn is_alive(&self) -> bool {
        !matches!(self.state, ConnectionState::Closed | ConnectionState::Invalid)
    }

    /// Whether the handshake completed and polling is running.
    pub fn is_configured(&self) -> bool {
        self.state == ConnectionState::Polling
    }

    /// Continuation cursor, as last told by the server.
    pub fn cursor(&self) -> (&str, &str) {
        (&self.last_time, &self.last_row)
    }

    /// Drain events in arrival order.
    pub fn take_events(&mut self) -> Vec<ChatEvent> {
        std::mem::take(&mut self.events)
    }

    fn target(&self, stage: FetchStage) -> FetchTarget {
        FetchTarget {
            connection_id: self.id,
            username: self.username.clone(),
            chat_link: self.chat_link.clone(),
            stage,
        }
    }

    /// Start the handshake: fetch the chat landing page.
    ///
    /// The owning profile must be selected on the session. No-op unless the
    /// connection is still Disconnected.
    pub fn open(&mut self, session: &Session) {
        if self.state != ConnectionState::Disconnected {
            log::debug!(
                "Ignoring open() for '{}' in state {:?}",
                self.username,
                self.state
            );
            return;
        }
        match session.build_get(&self.chat_link, &[]) {
            Ok(request) => {
                session.spawn_fetch(request, self.target(FetchStage::Index));
                self.state = ConnectionState::Connecting;
            }
            Err(e) => self.fail(format!("building index request: {e}")),
        }
    }

    /// Feed a completed fetch back into the state machine.
    ///
    /// The owning profile must be selected on the session (follow-up
    /// requests inherit its cookies). Replies arriving for a dead
    /// connection are discarded.
    pub fn handle_reply(
        &mut self,
        now: DateTime<Utc>,
        session: &Session,
        stage: FetchStage,
        outcome: Result<ResponseBody>,
    ) {
        if !self.is_alive() {
            log::debug!(
                "Discarding {:?} reply for '{}': connection is {:?}",
                stage,
                self.username,
                self.state
            );
            return;
        }

        let body = match outcome {
            Ok(body) => body,
            Err(e) => {
                self.fail(format!("{stage:?} request failed: {e}"));
                return;
            }
        };

        let result = match stage {
            FetchStage::Index => self.handle_index(session, body),
            FetchStage::Init => self.handle_init(now, body),
            FetchStage::Update => self.handle_update(body),
            FetchStage::Send => self.handle_send_ack(body),
        };
        if let Err(e) = result {
            self.fail(e.to_string());
        }
    }

    /// Landing page arrived: parse the room configuration and kick off the
    /// `init` call.
    fn handle_index(&mut self, session: &Session, body: ResponseBody) -> Result<()> {
        let html = body.into_text()?;
        let page_url = Url::parse(&self.chat_link)?;
        let config = chat_config::parse(&page_url, &html)?;

        let request = session.build_post(
            &config.ajax_url,
            &[
                ("action", "init"),
                ("chat_sid", &config.sid),
                ("theme", &config.theme),
            ],
        )?;
        session.spawn_fetch(request, self.target(FetchStage::Init));
        self.config = Some(config);
        self.state = ConnectionState::Configuring;
        Ok(())
    }

    /// `init` answered: the connection is up.
    fn handle_init(&mut self, now: DateTime<Utc>, body: ResponseBody) -> Result<()> {
        let update = decode_update(&body.into_json()?)?;
        self.state = ConnectionState::Polling;
        self.last_ping = Some(now);
        self.events.push(ChatEvent::Connected {
            username: self.username.clone(),
        });
        if let Some(action) = self.apply_update(update) {
            self.events.push(ChatEvent::Action {
                username: self.username.clone(),
                action,
            });
        }
        Ok(())
    }

    /// Poll answered: advance the cursor, surface new traffic.
    fn handle_update(&mut self, body: ResponseBody) -> Result<()> {
        let update = decode_update(&body.into_json()?)?;
        if let Some(action) = self.apply_update(update) {
            self.events.push(ChatEvent::Action {
                username: self.username.clone(),
                action,
            });
        }
        Ok(())
    }

    /// Send acknowledged. A non-"true" ack is a soft failure: logged, but
    /// the connection stays alive.
    fn handle_send_ack(&mut self, body: ResponseBody) -> Result<()> {
        let ack = body.into_text()?;
        if ack.trim() != "true" {
            log::warn!(
                "Message for '{}' not acknowledged by the server: {:?}",
                self.username,
                ack.trim()
            );
        }
        Ok(())
    }

    /// Tick the poll loop: fire an `update` request if the ping period has
    /// elapsed. Never blocks; never polls more often than the server asked.
    pub fn update(&mut self, now: DateTime<Utc>, session: &Session) {
        if self.state != ConnectionState::Polling {
            return;
        }
        let Some(config) = &self.config else { return };

        let due = match self.last_ping {
            None => true,
            Some(at) => now >= at + Duration::milliseconds(config.ping_ms as i64),
        };
        if !due {
            return;
        }
        self.last_ping = Some(now);

        match session.build_post(
            &config.ajax_url,
            &[
                ("action", "update"),
                ("chat_sid", &config.sid),
                ("theme", &config.theme),
                ("chat_lastrow", &self.last_row),
                ("chat_lasttime", &self.last_time),
            ],
        ) {
            Ok(request) => session.spawn_fetch(request, self.target(FetchStage::Update)),
            Err(e) => self.fail(format!("building update request: {e}")),
        }
    }

    /// Post a message to the room. A no-op (logged) unless the connection
    /// finished its handshake.
    pub fn send_message(&mut self, session: &Session, text: &str) {
        if self.state != ConnectionState::Polling {
            log::info!(
                "Dropping message for '{}': connection is {:?}",
                self.username,
                self.state
            );
            return;
        }
        let Some(config) = &self.config else { return };

        match session.build_post(
            &config.ajax_url,
            &[
                ("action", "chat"),
                ("chat_sid", &config.sid),
                ("theme", &config.theme),
                ("chat_message", text),
            ],
        ) {
            Ok(request) => session.spawn_fetch(request, self.target(FetchStage::Send)),
            // Soft failure: the message is lost, the connection lives on.
            Err(e) => log::warn!("Could not build send request for '{}': {e}", self.username),
        }
    }

    /// Close the connection. In-flight replies will be discarded on
    /// arrival.
    pub fn close(&mut self) {
        if self.is_alive() {
            self.state = ConnectionState::Closed;
        }
    }

    /// Enter the absorbing Invalid state; fire the error event once.
    fn fail(&mut self, message: String) {
        if !self.is_alive() {
            return;
        }
        self.state = ConnectionState::Invalid;
        log::warn!(
            "Chat connection of '{}' to {} failed: {}",
            self.username,
            self.chat_link,
            message
        );
        if !self.error_fired {
            self.error_fired = true;
            self.events.push(ChatEvent::ConnectionError {
                username: self.username.clone(),
                message,
            });
        }
    }

    /// Apply a decoded update: advance the cursor, merge the user snapshot,
    /// deduplicate messages. Returns the resulting action, if it carries
    /// anything.
    fn apply_update(&mut self, update: ChatUpdate) -> Option<ChatAction> {
        self.last_time = update.last_time;
        self.last_row = update.last_row;

        let mut fresh = Vec::new();
        for message in update.messages {
            if self.seen_messages.insert(message.id.clone()) {
                fresh.push(message);
            }
        }

        let action = ChatAction {
            new_users: update.users,
            new_messages: fresh,
        };
        if action.is_empty() { None } else { Some(action) }
    }
}

/// Decode an `update`-style response payload.
///
/// The payload must be a JSON object without an `error` key. Missing
/// cursor tokens default to `""`/`"0"`; a `users` entry replaces the full
/// active-user snapshot; `msgs` carries message objects identified by their
/// server-assigned id. Failure here never mutates connection state.
pub fn decode_update(value: &Value) -> Result<ChatUpdate> {
    let object = value
        .as_object()
        .ok_or_else(|| AppError::protocol("chat update", "payload is not a JSON object"))?;

    if let Some(error) = object.get("error") {
        return Err(AppError::protocol(
            "chat update",
            format!("server reported error: {}", text_of(error)),
        ));
    }

    let last_time = object.get("lasttime").map(text_of).unwrap_or_default();
    let last_row = object
        .get("lastrow")
        .map(text_of)
        .unwrap_or_else(|| "0".to_string());

    let users = match object.get("users") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(decode_user)
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(_) => {
            return Err(AppError::protocol("chat update", "'users' is not an array"));
        }
    };

    let messages = match object.get("msgs") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(decode_message)
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(AppError::protocol("chat update", "'msgs' is not an array"));
        }
    };

    Ok(ChatUpdate {
        last_time,
        last_row,
        users,
        messages,
    })
}

fn decode_user(value: &Value) -> Result<ChatUser> {
    let id = value
        .get("id")
        .map(text_of)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::protocol("chat update", "user without id"))?;
    Ok(ChatUser {
        id,
        name: value.get("name").map(text_of).unwrap_or_default(),
        url: value.get("url").and_then(Value::as_str).map(str::to_string),
    })
}

fn decode_message(value: &Value) -> Result<ChatMessage> {
    let id = value
        .get("id")
        .map(text_of)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::protocol("chat update", "message without id"))?;
    Ok(ChatMessage {
        id,
        user: value.get("user").and_then(Value::as_str).map(str::to_string),
        message: value.get("message").map(text_of).unwrap_or_default(),
        timestamp: value.get("timestamp").and_then(Value::as_i64),
    })
}

/// Stringify a scalar JSON value without quoting strings.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
