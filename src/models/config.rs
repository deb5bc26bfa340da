//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Portal endpoints
    #[serde(default)]
    pub portal: PortalConfig,

    /// HTTP client behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Bot timing and scheduling behavior
    #[serde(default)]
    pub bot: BotConfig,

    /// Reachability probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Persisted state file locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if Url::parse(&self.portal.base_url).is_err() {
            return Err(AppError::validation("portal.base_url is not a valid URL"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.redirect_limit == 0 {
            return Err(AppError::validation("http.redirect_limit must be > 0"));
        }
        if self.bot.tick_ms == 0 {
            return Err(AppError::validation("bot.tick_ms must be > 0"));
        }
        if self.probe.interval_secs == 0 {
            return Err(AppError::validation("probe.interval_secs must be > 0"));
        }
        if self.probe.failure_threshold == 0 {
            return Err(AppError::validation("probe.failure_threshold must be > 0"));
        }
        Ok(())
    }
}

/// Portal endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the EOS portal, without a trailing path
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
}

impl PortalConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Login form endpoint.
    pub fn login_url(&self) -> String {
        format!("{}/login/index.php", self.base())
    }

    /// Front page, used for session checks.
    pub fn index_url(&self) -> String {
        format!("{}/index.php", self.base())
    }

    /// Landing page of a chat room. Stable identity of a chat session.
    pub fn chat_index_url(&self, chat_id: u64) -> String {
        format!("{}/mod/chat/gui_ajax/index.php?id={}", self.base(), chat_id)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
        }
    }
}

/// HTTP client behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per request
    #[serde(default = "defaults::redirect_limit")]
    pub redirect_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            redirect_limit: defaults::redirect_limit(),
        }
    }
}

/// Bot timing and scheduling behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Coordinator tick interval in milliseconds
    #[serde(default = "defaults::tick_ms")]
    pub tick_ms: u64,

    /// Offset added to UTC before week-relative schedule math, in minutes
    #[serde(default)]
    pub utc_offset_min: i32,

    /// Offset added to the ISO week number before the biweekly parity check
    #[serde(default)]
    pub week_parity_offset: u8,

    /// Join phrase used when a profile has no reaction configured
    #[serde(default = "defaults::join_phrase")]
    pub join_phrase: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_ms: defaults::tick_ms(),
            utc_offset_min: 0,
            week_parity_offset: 0,
            join_phrase: defaults::join_phrase(),
        }
    }
}

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Seconds between reachability probes
    #[serde(default = "defaults::probe_interval")]
    pub interval_secs: u64,

    /// Probe request timeout in seconds (distinct from the chat ping period)
    #[serde(default = "defaults::probe_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failures before the link counts as down
    #[serde(default = "defaults::probe_failures")]
    pub failure_threshold: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::probe_interval(),
            timeout_secs: defaults::probe_timeout(),
            failure_threshold: defaults::probe_failures(),
        }
    }
}

/// Persisted state file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding all persisted state
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,

    /// Account list (credentials, cookies, reaction config)
    #[serde(default = "defaults::profiles_file")]
    pub profiles_file: String,

    /// Lesson schedule
    #[serde(default = "defaults::schedule_file")]
    pub schedule_file: String,

    /// Scheduled-connection progress records
    #[serde(default = "defaults::scheduled_file")]
    pub scheduled_file: String,
}

impl PathsConfig {
    /// Resolve a state file name against the data directory.
    pub fn resolve(&self, file: &str) -> PathBuf {
        Path::new(&self.data_dir).join(file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            profiles_file: defaults::profiles_file(),
            schedule_file: defaults::schedule_file(),
            scheduled_file: defaults::scheduled_file(),
        }
    }
}

mod defaults {
    // Portal defaults
    pub fn base_url() -> String {
        "https://eos.uni-example.edu".into()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; eosbot/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn redirect_limit() -> usize {
        10
    }

    // Bot defaults
    pub fn tick_ms() -> u64 {
        500
    }
    pub fn join_phrase() -> String {
        "Hello!".into()
    }

    // Probe defaults
    pub fn probe_interval() -> u64 {
        3
    }
    pub fn probe_timeout() -> u64 {
        10
    }
    pub fn probe_failures() -> u32 {
        3
    }

    // Path defaults
    pub fn data_dir() -> String {
        "data".into()
    }
    pub fn profiles_file() -> String {
        "profiles.json".into()
    }
    pub fn schedule_file() -> String {
        "schedule.json".into()
    }
    pub fn scheduled_file() -> String {
        "scheduled.json".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.portal.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_portal_urls() {
        let portal = PortalConfig {
            base_url: "https://eos.example.edu/".to_string(),
        };
        assert_eq!(portal.login_url(), "https://eos.example.edu/login/index.php");
        assert_eq!(
            portal.chat_index_url(42),
            "https://eos.example.edu/mod/chat/gui_ajax/index.php?id=42"
        );
    }
}
