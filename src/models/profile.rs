// src/models/profile.rs

//! Bot account ("profile") data structures.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One portal account driven by the bot.
///
/// Identity fields (`display_name`, `profile_url`, `profile_id`) and the
/// cookie pair are populated by a successful login and cleared again by
/// [`Profile::invalidate`]. `valid` is true only in between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// Portal login name. Unique within the store.
    pub username: String,

    /// Portal password
    pub password: String,

    /// Session cookie value captured after login
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// "Remember username" cookie value captured after login
    #[serde(default)]
    pub remember_cookie: Option<String>,

    /// Display name scraped from the logged-in navigation
    #[serde(default)]
    pub display_name: Option<String>,

    /// Profile page URL scraped from the logged-in navigation
    #[serde(default)]
    pub profile_url: Option<String>,

    /// Numeric account id derived from the profile URL
    #[serde(default)]
    pub profile_id: Option<u64>,

    /// True between a successful login/check and the next invalidate
    #[serde(default)]
    pub valid: bool,

    /// Upper bound for the randomized join delay, in milliseconds
    #[serde(default = "defaults::max_late_ms")]
    pub max_late_ms: u64,

    /// Chat reaction behavior for this account
    #[serde(default)]
    pub reaction: ReactionConfig,
}

impl Profile {
    /// Create a fresh, not-yet-authenticated profile.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            session_cookie: None,
            remember_cookie: None,
            display_name: None,
            profile_url: None,
            profile_id: None,
            valid: false,
            max_late_ms: defaults::max_late_ms(),
            reaction: ReactionConfig::default(),
        }
    }

    /// Drop all identity state. Idempotent; safe on an already-invalid
    /// profile.
    pub fn invalidate(&mut self) {
        self.session_cookie = None;
        self.remember_cookie = None;
        self.display_name = None;
        self.profile_url = None;
        self.profile_id = None;
        self.valid = false;
    }
}

/// How an account reacts inside a chat room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReactionConfig {
    /// Send a fixed phrase on join; ignore chat traffic.
    /// An empty phrase falls back to the configured default.
    Phrase {
        #[serde(default)]
        text: String,
    },

    /// Send an optional join phrase, then answer messages matching
    /// regex rules.
    Patterns {
        #[serde(default)]
        join: Option<String>,
        rules: Vec<PatternRule>,
    },
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self::Phrase {
            text: String::new(),
        }
    }
}

/// A single pattern → reply rule.
///
/// `reply` may reference `{name}` (sender) and `{message}` (matched text).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternRule {
    pub pattern: String,
    pub reply: String,
}

/// All known profiles, keyed by unique username.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Build a store from a profile list, rejecting duplicate usernames.
    pub fn from_profiles(profiles: Vec<Profile>) -> Result<Self> {
        let mut store = Self::default();
        for profile in profiles {
            store.insert(profile)?;
        }
        Ok(store)
    }

    /// Add a profile. Fails if the username is already taken.
    pub fn insert(&mut self, profile: Profile) -> Result<()> {
        if self.get(&profile.username).is_some() {
            return Err(AppError::validation(format!(
                "duplicate profile username '{}'",
                profile.username
            )));
        }
        self.profiles.push(profile);
        Ok(())
    }

    /// Remove a profile by username.
    pub fn remove(&mut self, username: &str) -> Option<Profile> {
        let idx = self.profiles.iter().position(|p| p.username == username)?;
        Some(self.profiles.remove(idx))
    }

    pub fn get(&self, username: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.username == username)
    }

    pub fn get_mut(&mut self, username: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.username == username)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Profile> {
        self.profiles.iter_mut()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.username.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The profile list in storage order, for persistence.
    pub fn as_slice(&self) -> &[Profile] {
        &self.profiles
    }
}

mod defaults {
    pub fn max_late_ms() -> u64 {
        5 * 60 * 1000
    }
}
