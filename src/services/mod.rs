// src/services/mod.rs

//! Active components of the engine: the HTTP session, the login protocol,
//! and the chat connection protocol.

pub mod auth;
pub mod chat_config;
pub mod chat_session;
pub mod connection;
pub mod reaction;
pub mod session;

// Re-export the types collaborators work with
pub use chat_config::ChatRoomConfig;
pub use chat_session::ChatSession;
pub use connection::{ChatConnection, ChatEvent, ConnectionState, FetchStage, FetchTarget};
pub use reaction::{Reaction, ReactionContext};
pub use session::{FetchReply, PreparedRequest, ResponseBody, ResponseKind, Session};
