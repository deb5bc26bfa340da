// src/services/reaction.rs

//! Chat reaction capability.
//!
//! What an account does once it is inside a chat room is pluggable: the
//! coordinator only requires the [`Reaction`] trait. Two implementations
//! live here — a fixed join phrase and a regex pattern table. Reactions
//! return the messages to send rather than sending them, so silent-mode
//! handling and delivery stay with the caller, and a failing reaction can
//! be caught and reported without aborting the coordinator tick.

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{ChatAction, ReactionConfig};

/// Connection facts handed to a reaction.
#[derive(Debug, Clone, Copy)]
pub struct ReactionContext<'a> {
    pub username: &'a str,

    /// Display name on the portal, used to skip the account's own messages
    pub display_name: Option<&'a str>,

    pub chat_link: &'a str,

    pub room_name: Option<&'a str>,
}

/// An account's scripted chat behavior.
pub trait Reaction {
    /// Messages to send right after the connection comes up.
    fn on_connected(&self, ctx: &ReactionContext<'_>) -> Result<Vec<String>>;

    /// Messages to send in response to new chat traffic.
    fn on_action(&self, ctx: &ReactionContext<'_>, action: &ChatAction) -> Result<Vec<String>>;
}

/// Default behavior: send one fixed phrase on join, ignore traffic.
pub struct FixedPhrase {
    phrase: String,
}

impl FixedPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
        }
    }
}

impl Reaction for FixedPhrase {
    fn on_connected(&self, _ctx: &ReactionContext<'_>) -> Result<Vec<String>> {
        if self.phrase.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![self.phrase.clone()])
        }
    }

    fn on_action(&self, _ctx: &ReactionContext<'_>, _action: &ChatAction) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Pattern-driven behavior: optional join phrase plus regex → reply rules.
///
/// The first matching rule wins per message. Replies may reference
/// `{name}` (sender) and `{message}` (the message text).
pub struct PatternTable {
    join: Option<String>,
    rules: Vec<(Regex, String)>,
}

impl Reaction for PatternTable {
    fn on_connected(&self, _ctx: &ReactionContext<'_>) -> Result<Vec<String>> {
        Ok(self.join.clone().into_iter().collect())
    }

    fn on_action(&self, ctx: &ReactionContext<'_>, action: &ChatAction) -> Result<Vec<String>> {
        let mut replies = Vec::new();
        for message in &action.new_messages {
            // never answer the account's own messages
            if message.user.is_some() && message.user.as_deref() == ctx.display_name {
                continue;
            }
            for (pattern, reply) in &self.rules {
                if pattern.is_match(&message.message) {
                    replies.push(
                        reply
                            .replace("{name}", message.user.as_deref().unwrap_or(""))
                            .replace("{message}", &message.message),
                    );
                    break;
                }
            }
        }
        Ok(replies)
    }
}

/// Build a reaction from its persisted configuration.
///
/// An empty fixed phrase falls back to `default_phrase`; invalid rule
/// patterns are a validation error.
pub fn build(config: &ReactionConfig, default_phrase: &str) -> Result<Box<dyn Reaction>> {
    match config {
        ReactionConfig::Phrase { text } => {
            let phrase = if text.is_empty() { default_phrase } else { text };
            Ok(Box::new(FixedPhrase::new(phrase)))
        }
        ReactionConfig::Patterns { join, rules } => {
            let compiled = rules
                .iter()
                .map(|rule| {
                    Regex::new(&rule.pattern)
                        .map(|re| (re, rule.reply.clone()))
                        .map_err(|e| {
                            AppError::validation(format!(
                                "bad reaction pattern '{}': {e}",
                                rule.pattern
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Box::new(PatternTable {
                join: join.clone(),
                rules: compiled,
            }))
        }
    }
}
