//! In-memory storage implementation.
//!
//! Keeps all state in process memory. Used by tests to simulate restarts
//! (drop the engine, keep the store) without touching the filesystem.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Lesson, Profile, ScheduledRecord};
use crate::storage::StateStorage;

#[derive(Debug, Default)]
struct MemoryState {
    profiles: Option<Vec<Profile>>,
    schedule: Option<Vec<Lesson>>,
    scheduled: Option<Vec<ScheduledRecord>>,
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStorage for MemoryStore {
    async fn load_profiles(&self) -> Result<Option<Vec<Profile>>> {
        Ok(self.state.lock().unwrap().profiles.clone())
    }

    async fn save_profiles(&self, profiles: &[Profile]) -> Result<()> {
        self.state.lock().unwrap().profiles = Some(profiles.to_vec());
        Ok(())
    }

    async fn load_schedule(&self) -> Result<Option<Vec<Lesson>>> {
        Ok(self.state.lock().unwrap().schedule.clone())
    }

    async fn save_schedule(&self, lessons: &[Lesson]) -> Result<()> {
        self.state.lock().unwrap().schedule = Some(lessons.to_vec());
        Ok(())
    }

    async fn load_scheduled(&self) -> Result<Option<Vec<ScheduledRecord>>> {
        Ok(self.state.lock().unwrap().scheduled.clone())
    }

    async fn save_scheduled(&self, records: &[ScheduledRecord]) -> Result<()> {
        self.state.lock().unwrap().scheduled = Some(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_loads_none() {
        let store = MemoryStore::new();
        assert!(store.load_scheduled().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saved_state_survives() {
        let store = MemoryStore::new();
        store.save_profiles(&[Profile::new("alice", "pw")]).await.unwrap();
        let loaded = store.load_profiles().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].username, "alice");
    }
}
