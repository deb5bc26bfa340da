// src/services/chat_config.rs

//! Chat room configuration parser.
//!
//! The chat landing page embeds two JS initializer blobs:
//!
//! ```text
//! M.mod_chat_ajax.init(Y, {"chatroom_name":"Algebra","sid":"...","timer":5000,"theme":"course"});
//! M.cfg = {"wwwroot":"https:\/\/eos...","sesskey":"AbCdEf1234"};
//! ```
//!
//! Both are required. The page format is an unversioned external contract:
//! a missing pattern or malformed JSON is a hard connection error and is
//! never retried.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::url::host_with_port;

/// Parsed chat room configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoomConfig {
    /// Synthesized AJAX endpoint, sesskey included
    pub ajax_url: String,

    /// Room title
    pub room_name: String,

    /// Chat session id, required by every AJAX action
    pub sid: String,

    /// Theme name the legacy API insists on
    pub theme: String,

    /// Server-dictated poll interval in milliseconds
    pub ping_ms: u64,
}

fn init_blob_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)M\.mod_chat_ajax\.init\(\s*Y\s*,\s*(\{.*?\})\s*\)")
            .expect("hardcoded regex")
    })
}

fn sesskey_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""sesskey"\s*:\s*"([^"]+)""#).expect("hardcoded regex"))
}

/// Extract the chat room configuration from the landing page.
///
/// `page_url` provides scheme and host for the synthesized AJAX endpoint.
pub fn parse(page_url: &Url, html: &str) -> Result<ChatRoomConfig> {
    let blob = init_blob_re()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| AppError::protocol("chat config", "chat initializer call not found"))?;

    let init: Value = serde_json::from_str(blob.as_str())
        .map_err(|e| AppError::protocol("chat config", format!("malformed initializer JSON: {e}")))?;

    let room_name = str_field(&init, "chatroom_name")?;
    let sid = str_field(&init, "sid")?;
    let theme = str_field(&init, "theme")?;
    let ping_ms = u64_field(&init, "timer")?;

    let sesskey = sesskey_re()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::protocol("chat config", "sesskey not found"))?;

    let host = host_with_port(page_url)
        .ok_or_else(|| AppError::protocol("chat config", "page URL has no host"))?;
    let ajax_url = format!(
        "{}://{}/mod/chat/chat_ajax.php?sesskey={}",
        page_url.scheme(),
        host,
        sesskey
    );

    Ok(ChatRoomConfig {
        ajax_url,
        room_name,
        sid,
        theme,
        ping_ms,
    })
}

fn str_field(value: &Value, name: &str) -> Result<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::protocol("chat config", format!("missing field '{name}'")))
}

fn u64_field(value: &Value, name: &str) -> Result<u64> {
    value
        .get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::protocol("chat config", format!("missing field '{name}'")))
}
