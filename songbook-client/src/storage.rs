//! Local persistence for the song collection
//!
//! [`KeyValueStore`] is a durable string slot per key. [`LocalSongStore`]
//! keeps the whole collection under [`STORAGE_KEY`] as a JSON array of
//! [`StoredSong`]. Only durable audio paths are written; a pending audio
//! file is stored as `null`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songbook_common::{time, AudioRef, Song};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Key under which the collection is stored
pub const STORAGE_KEY: &str = "song-manager-songs";

/// Durable string slots addressed by key
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

/// Write `bytes` to `tmp_path`, flush to disk, then rename over `path`
async fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp_path, path).await
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        if let Err(e) = write_and_rename(&tmp_path, &path, value.as_bytes()).await {
            match fs::remove_file(&tmp_path).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
                Err(cleanup) => warn!(
                    path = %tmp_path.display(),
                    error = %cleanup,
                    "Failed to remove temporary storage file"
                ),
            }
            return Err(e.into());
        }

        debug!(key, path = %path.display(), bytes = value.len(), "Wrote local storage slot");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Persisted shape of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSong {
    pub id: String,
    pub title: String,
    pub musical_range: String,
    #[serde(default)]
    pub last_sung: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub audio_path: Option<String>,
}

impl From<&Song> for StoredSong {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id.clone(),
            title: song.title.clone(),
            musical_range: song.musical_range.clone(),
            last_sung: song.last_sung,
            created_at: Some(song.created_at),
            // Pending files are not persistable
            audio_path: song.audio.stored_path().map(str::to_string),
        }
    }
}

impl From<StoredSong> for Song {
    fn from(stored: StoredSong) -> Self {
        Song {
            id: stored.id,
            title: stored.title,
            musical_range: stored.musical_range,
            audio: AudioRef::from_path(stored.audio_path),
            last_sung: stored.last_sung,
            created_at: stored.created_at.unwrap_or_else(time::now),
        }
    }
}

/// The song collection persisted in a [`KeyValueStore`]
#[derive(Debug)]
pub struct LocalSongStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> LocalSongStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored collection
    ///
    /// Never fails: an absent slot yields an empty collection, and an
    /// unreadable or malformed one is logged and also yields empty.
    pub async fn load(&self) -> Vec<Song> {
        match self.try_load().await {
            Ok(songs) => songs,
            Err(e) => {
                error!(key = %self.key, error = %e, "Error reading stored songs");
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<Song>, StoreError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };

        let stored: Vec<StoredSong> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        debug!(key = %self.key, count = stored.len(), "Loaded songs from local storage");

        Ok(stored.into_iter().map(Song::from).collect())
    }

    /// Replace the stored collection
    pub async fn save(&self, songs: &[Song]) -> Result<(), StoreError> {
        let stored: Vec<StoredSong> = songs.iter().map(StoredSong::from).collect();
        let raw = serde_json::to_string(&stored)?;
        self.store.set(&self.key, &raw).await?;
        debug!(key = %self.key, count = stored.len(), "Saved songs to local storage");
        Ok(())
    }

    /// Drop the stored collection
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songbook_common::AudioFile;

    fn sample_songs() -> Vec<Song> {
        vec![
            Song::new("Alto Part", "low").with_audio(AudioRef::Stored("/uploads/a.mp3".into())),
            Song::new("Tenor", "high")
                .with_last_sung(Some(time::now()))
                .with_audio(AudioRef::Pending(AudioFile::new(
                    "t.mp3",
                    "audio/mpeg",
                    vec![1, 2, 3],
                ))),
        ]
    }

    #[tokio::test]
    async fn test_absent_key_loads_empty() {
        let local = LocalSongStore::new(MemoryStore::new());
        assert!(local.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_loads_empty() {
        let store = MemoryStore::new();
        store.set(STORAGE_KEY, "{not json").await.unwrap();
        let local = LocalSongStore::new(store);
        assert!(local.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_loads_empty() {
        let store = MemoryStore::new();
        store.set(STORAGE_KEY, r#"{"id": "not-an-array"}"#).await.unwrap();
        let local = LocalSongStore::new(store);
        assert!(local.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_drops_pending_audio() {
        let local = LocalSongStore::new(MemoryStore::new());
        let songs = sample_songs();
        local.save(&songs).await.unwrap();

        let loaded = local.load().await;
        assert_eq!(loaded.len(), 2);
        for (before, after) in songs.iter().zip(&loaded) {
            assert_eq!(after.id, before.id);
            assert_eq!(after.title, before.title);
            assert_eq!(after.musical_range, before.musical_range);
            assert_eq!(after.last_sung, before.last_sung);
            assert_eq!(after.created_at, before.created_at);
        }
        assert_eq!(loaded[0].audio, AudioRef::Stored("/uploads/a.mp3".into()));
        assert_eq!(loaded[1].audio, AudioRef::None);
    }

    #[tokio::test]
    async fn test_persisted_shape_uses_camel_case_and_null_audio() {
        let store = MemoryStore::new();
        let local = LocalSongStore::new(store);
        let song = Song::new("Tenor", "high").with_audio(AudioRef::Pending(AudioFile::new(
            "t.mp3",
            "audio/mpeg",
            vec![9; 16],
        )));
        local.save(std::slice::from_ref(&song)).await.unwrap();

        let raw = local.store().get(STORAGE_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value[0];
        assert_eq!(record["id"], song.id.as_str());
        assert_eq!(record["musicalRange"], "high");
        assert!(record["lastSung"].is_null());
        assert!(record["audioPath"].is_null());
        assert!(record["createdAt"].is_string());
        assert!(record.get("audioFile").is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_slot() {
        let local = LocalSongStore::new(MemoryStore::new());
        local.save(&sample_songs()).await.unwrap();
        local.clear().await.unwrap();
        assert!(local.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set(STORAGE_KEY, "[]").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", STORAGE_KEY)]);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the slot file should go makes the rename fail
        let blocker = dir.path().join(format!("{}.json", STORAGE_KEY));
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let store = FileStore::new(dir.path());
        assert!(store.set(STORAGE_KEY, "[]").await.is_err());
        assert!(!dir.path().join(format!("{}.json.tmp", STORAGE_KEY)).exists());
    }
}
