//! Song entity model
//!
//! A [`Song`] is the single entity managed by songbook. Its audio reference is
//! a tagged variant so an in-memory file handle can never be confused with
//! the durable server path: only [`AudioRef::Stored`] survives persistence.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::{time, uuid_utils};

/// Priority assigned to songs that were never sung
pub const NEVER_SUNG_PRIORITY: i64 = 1000;

/// Songs sung longer ago than this are shown with an absolute date
const RELATIVE_FORMAT_DAYS: i64 = 30;

/// In-memory audio file attached to a song before upload
///
/// Held only in memory; never written to local storage.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioFile {
    /// Original file name (extension is kept by the server)
    pub file_name: String,
    /// Media type, e.g. `audio/mpeg`
    pub content_type: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl AudioFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Reference to a song's audio
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AudioRef {
    /// No audio attached
    #[default]
    None,
    /// Local file not yet uploaded (not persistable)
    Pending(AudioFile),
    /// Server-relative path, e.g. `/uploads/<name>.mp3`
    Stored(String),
}

impl AudioRef {
    /// Build a stored reference, treating an empty path as no audio
    pub fn from_path(path: Option<String>) -> Self {
        match path {
            Some(path) if !path.trim().is_empty() => AudioRef::Stored(path),
            _ => AudioRef::None,
        }
    }

    /// Pending file handle, if any
    pub fn pending(&self) -> Option<&AudioFile> {
        match self {
            AudioRef::Pending(file) => Some(file),
            _ => None,
        }
    }

    /// Durable path, if any
    pub fn stored_path(&self) -> Option<&str> {
        match self {
            AudioRef::Stored(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AudioRef::None)
    }
}

/// A song in the collection
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Server-assigned id, or a client-generated UUID for local songs
    pub id: String,
    pub title: String,
    /// Free-text range descriptor, e.g. "A3-E5"
    pub musical_range: String,
    pub audio: AudioRef,
    /// `None` means never sung
    pub last_sung: Option<DateTime<Utc>>,
    /// Set once at creation
    pub created_at: DateTime<Utc>,
}

impl Song {
    /// Create a new song with a client-generated id
    pub fn new(title: impl Into<String>, musical_range: impl Into<String>) -> Self {
        Self {
            id: uuid_utils::generate_id(),
            title: title.into(),
            musical_range: musical_range.into(),
            audio: AudioRef::None,
            last_sung: None,
            created_at: time::now(),
        }
    }

    pub fn with_audio(mut self, audio: AudioRef) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_last_sung(mut self, last_sung: Option<DateTime<Utc>>) -> Self {
        self.last_sung = last_sung;
        self
    }

    /// Stamp the song as sung now, using the local clock
    pub fn mark_sung(&mut self) {
        self.last_sung = Some(time::now());
    }

    /// Whole days since the song was last sung, relative to `now`
    pub fn days_since_last_sung_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_sung
            .map(|last_sung| (now - last_sung).num_days().abs())
    }

    pub fn days_since_last_sung(&self) -> Option<i64> {
        self.days_since_last_sung_at(time::now())
    }

    /// Practice priority: never-sung songs first, then the longest-unsung
    pub fn sung_priority(&self) -> i64 {
        self.days_since_last_sung().unwrap_or(NEVER_SUNG_PRIORITY)
    }

    /// Human-readable last-sung label relative to `now`
    pub fn format_last_sung(&self, now: DateTime<Utc>) -> String {
        let Some(last_sung) = self.last_sung else {
            return "Never".to_string();
        };

        match self.days_since_last_sung_at(now).unwrap_or_default() {
            0 => "Today".to_string(),
            1 => "Yesterday".to_string(),
            days if days < RELATIVE_FORMAT_DAYS => format!("{} days ago", days),
            _ => last_sung.format("%Y-%m-%d").to_string(),
        }
    }

    /// Full URL of stored audio on the server at `origin`
    ///
    /// Pending files have no URL until uploaded.
    pub fn audio_url(&self, origin: &str) -> Option<String> {
        self.audio
            .stored_path()
            .map(|path| format!("{}{}", origin.trim_end_matches('/'), path))
    }
}
