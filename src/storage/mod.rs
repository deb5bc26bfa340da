//! Storage abstractions for persisted bot state.
//!
//! Three state files survive restarts:
//! - profiles: credentials, captured cookies, reaction config
//! - schedule: the lesson list
//! - scheduled: scheduled-connection progress (join instants, fired flags)
//!
//! The scheduled file is what makes join actions idempotent across crashes:
//! it must be loaded before the first coordinator tick and saved after every
//! mutating event.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Lesson, Profile, ScheduledRecord};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Trait for bot state storage backends.
///
/// Loads return `None` when the backing record has never been written,
/// letting callers distinguish "no state yet" from an empty list.
#[async_trait]
pub trait StateStorage: Send + Sync {
    async fn load_profiles(&self) -> Result<Option<Vec<Profile>>>;
    async fn save_profiles(&self, profiles: &[Profile]) -> Result<()>;

    async fn load_schedule(&self) -> Result<Option<Vec<Lesson>>>;
    async fn save_schedule(&self, lessons: &[Lesson]) -> Result<()>;

    async fn load_scheduled(&self) -> Result<Option<Vec<ScheduledRecord>>>;
    async fn save_scheduled(&self, records: &[ScheduledRecord]) -> Result<()>;
}
