//! Local filesystem storage implementation.
//!
//! One JSON file per state record under the configured data directory.
//! Writes are atomic (write to temp, then rename) so a crash mid-save never
//! leaves a truncated state file behind.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Lesson, PathsConfig, Profile, ScheduledRecord};
use crate::storage::StateStorage;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    profiles_path: PathBuf,
    schedule_path: PathBuf,
    scheduled_path: PathBuf,
}

impl LocalStore {
    /// Create a store using the configured state file locations.
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            profiles_path: paths.resolve(&paths.profiles_file),
            schedule_path: paths.resolve(&paths.schedule_file),
            scheduled_path: paths.resolve(&paths.scheduled_file),
        }
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &PathBuf, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(path: &PathBuf, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        Self::write_bytes(path, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(path: &PathBuf) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(path: &PathBuf) -> Result<Option<T>> {
        match Self::read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StateStorage for LocalStore {
    async fn load_profiles(&self) -> Result<Option<Vec<Profile>>> {
        Self::read_json(&self.profiles_path).await
    }

    async fn save_profiles(&self, profiles: &[Profile]) -> Result<()> {
        Self::write_json(&self.profiles_path, profiles).await
    }

    async fn load_schedule(&self) -> Result<Option<Vec<Lesson>>> {
        Self::read_json(&self.schedule_path).await
    }

    async fn save_schedule(&self, lessons: &[Lesson]) -> Result<()> {
        Self::write_json(&self.schedule_path, lessons).await
    }

    async fn load_scheduled(&self) -> Result<Option<Vec<ScheduledRecord>>> {
        Self::read_json(&self.scheduled_path).await
    }

    async fn save_scheduled(&self, records: &[ScheduledRecord]) -> Result<()> {
        Self::write_json(&self.scheduled_path, records).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> LocalStore {
        let paths = PathsConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..PathsConfig::default()
        };
        LocalStore::new(&paths)
    }

    #[tokio::test]
    async fn test_missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.load_profiles().await.unwrap().is_none());
        assert!(store.load_schedule().await.unwrap().is_none());
        assert!(store.load_scheduled().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scheduled_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let mut record = ScheduledRecord::new("alice", "https://eos/chat?id=42", at);
        record.fired = true;

        store.save_scheduled(&[record.clone()]).await.unwrap();
        let loaded = store.load_scheduled().await.unwrap().unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[tokio::test]
    async fn test_profiles_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut profile = Profile::new("alice", "pw1");
        profile.valid = true;
        profile.session_cookie = Some("abc".into());

        store.save_profiles(&[profile.clone()]).await.unwrap();
        let loaded = store.load_profiles().await.unwrap().unwrap();
        assert_eq!(loaded, vec![profile]);
    }

    #[tokio::test]
    async fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save_scheduled(&[]).await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
    }
}
