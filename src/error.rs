// src/error.rs

//! Unified error handling for the bot application.

use std::fmt;

use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Server answered with a non-200 status
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Redirect chain exceeded the configured bound
    #[error("redirect limit ({limit}) exceeded for {url}")]
    RedirectLimit { limit: usize, url: String },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Portal login failed for an account
    #[error("Login failed for '{username}': {message}")]
    Login { username: String, message: String },

    /// The portal answered with an unexpected page or payload shape
    #[error("Protocol error in {context}: {message}")]
    Protocol { context: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a login error for an account.
    pub fn login(username: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Login {
            username: username.into(),
            message: message.to_string(),
        }
    }

    /// Create a protocol error with context.
    pub fn protocol(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Protocol {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
