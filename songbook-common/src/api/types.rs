//! Envelope, wire record and entity conversion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::song::{AudioRef, Song};
use crate::{time, Error};

/// Message used when a failed envelope carries none
pub const DEFAULT_FAILURE_MESSAGE: &str = "API operation failed";

/// Multipart field carrying the audio file
pub const AUDIO_FIELD: &str = "audioFile";

/// Response wrapper used by every endpoint: `{ success, message?, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Successful envelope carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Failed envelope with a message and no data
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Unwrap the payload, turning `success: false` or a missing payload
    /// into the failure message
    pub fn into_data(self) -> Result<T, String> {
        if !self.success {
            return Err(self
                .message
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()));
        }
        self.data
            .ok_or_else(|| "Response envelope has no data".to_string())
    }
}

/// Server-shaped song record
///
/// The identifier arrives as `id` or as the document-database style `_id`;
/// see [`SongRecord::resolved_id`] for precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub title: String,
    pub musical_range: String,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default)]
    pub last_sung: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Record conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Song record has neither `id` nor `_id`")]
    MissingId,
}

impl SongRecord {
    /// Identifier with `id` taking precedence over `_id`
    ///
    /// Empty strings count as absent.
    pub fn resolved_id(&self) -> Option<&str> {
        [self.id.as_deref(), self.object_id.as_deref()]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
    }
}

impl TryFrom<SongRecord> for Song {
    type Error = RecordError;

    fn try_from(record: SongRecord) -> Result<Self, Self::Error> {
        let id = record.resolved_id().ok_or(RecordError::MissingId)?.to_string();

        Ok(Song {
            id,
            title: record.title,
            musical_range: record.musical_range,
            audio: AudioRef::from_path(record.audio_path),
            last_sung: record.last_sung,
            created_at: record.created_at.unwrap_or_else(time::now),
        })
    }
}

/// Non-file fields of a create or update request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub musical_range: String,
    /// ISO-8601 timestamp; empty or absent means "not provided"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sung: Option<String>,
}

impl SongFields {
    /// Trim and check the required fields
    pub fn validated(self) -> crate::Result<Self> {
        let title = self.title.trim().to_string();
        let musical_range = self.musical_range.trim().to_string();

        if title.is_empty() {
            return Err(Error::InvalidInput("Please provide a song title".to_string()));
        }
        if musical_range.is_empty() {
            return Err(Error::InvalidInput(
                "Please provide the musical range".to_string(),
            ));
        }

        Ok(Self {
            title,
            musical_range,
            last_sung: self.last_sung,
        })
    }

    /// Parsed `lastSung`, `None` when absent or empty
    pub fn parsed_last_sung(&self) -> crate::Result<Option<DateTime<Utc>>> {
        match self.last_sung.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => time::parse_iso(value).map(Some).map_err(|e| {
                Error::InvalidInput(format!("Invalid lastSung timestamp '{}': {}", value, e))
            }),
        }
    }
}

impl From<&Song> for SongFields {
    fn from(song: &Song) -> Self {
        Self {
            title: song.title.clone(),
            musical_range: song.musical_range.clone(),
            last_sung: song.last_sung.as_ref().map(time::to_iso),
        }
    }
}

/// Payload of a successful delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedSong {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record_json() -> serde_json::Value {
        json!({
            "_id": "65f0c0ffee",
            "title": "Ave Maria",
            "musical_range": "G3-D5",
            "audio_path": "/uploads/abc.mp3",
            "last_sung": "2024-03-01T10:00:00.000Z",
            "created_at": "2024-02-01T09:30:00.000Z",
            "__v": 0
        })
    }

    #[test]
    fn test_record_with_object_id_converts() {
        let record: SongRecord = serde_json::from_value(record_json()).unwrap();
        let song = Song::try_from(record).unwrap();

        assert_eq!(song.id, "65f0c0ffee");
        assert_eq!(song.musical_range, "G3-D5");
        assert_eq!(song.audio, AudioRef::Stored("/uploads/abc.mp3".into()));
        assert_eq!(
            song.last_sung,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            song.created_at,
            Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_primary_id_wins_over_object_id() {
        let mut value = record_json();
        value["id"] = json!("primary");
        let record: SongRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.resolved_id(), Some("primary"));
    }

    #[test]
    fn test_empty_primary_id_falls_back() {
        let mut value = record_json();
        value["id"] = json!("");
        let record: SongRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.resolved_id(), Some("65f0c0ffee"));
    }

    #[test]
    fn test_missing_ids_fail_conversion() {
        let record: SongRecord = serde_json::from_value(json!({
            "title": "t",
            "musical_range": "r"
        }))
        .unwrap();
        assert_eq!(Song::try_from(record), Err(RecordError::MissingId));
    }

    #[test]
    fn test_absent_optional_fields_map_to_none() {
        let before = time::now();
        let record: SongRecord = serde_json::from_value(json!({
            "id": "x",
            "title": "t",
            "musical_range": "r",
            "audio_path": null,
            "last_sung": null
        }))
        .unwrap();
        let song = Song::try_from(record).unwrap();

        assert!(song.audio.is_none());
        assert!(song.last_sung.is_none());
        assert!(song.created_at >= before);
    }

    #[test]
    fn test_failed_envelope_without_data_parses() {
        let envelope: Envelope<SongRecord> =
            serde_json::from_str(r#"{"success":false,"message":"Song not found"}"#).unwrap();
        assert_eq!(envelope.into_data().unwrap_err(), "Song not found");
    }

    #[test]
    fn test_failed_envelope_default_message() {
        let envelope: Envelope<DeletedSong> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(envelope.into_data().unwrap_err(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn test_successful_envelope_without_data_is_error() {
        let envelope: Envelope<DeletedSong> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(envelope.into_data().is_err());
    }

    #[test]
    fn test_failure_envelope_serializes_without_data() {
        let json = serde_json::to_value(Envelope::<SongRecord>::failure("nope")).unwrap();
        assert_eq!(json, json!({"success": false, "message": "nope"}));
    }

    #[test]
    fn test_song_fields_camel_case() {
        let song = Song::new("Title", "Range")
            .with_last_sung(Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()));
        let json = serde_json::to_value(SongFields::from(&song)).unwrap();
        assert_eq!(
            json,
            json!({
                "title": "Title",
                "musicalRange": "Range",
                "lastSung": "2024-01-02T03:04:05.000Z"
            })
        );
    }

    #[test]
    fn test_validated_trims_and_rejects_blank() {
        let fields = SongFields {
            title: "  Ave  ".into(),
            musical_range: " low ".into(),
            last_sung: None,
        };
        let valid = fields.validated().unwrap();
        assert_eq!(valid.title, "Ave");
        assert_eq!(valid.musical_range, "low");

        let blank = SongFields {
            title: "   ".into(),
            musical_range: "low".into(),
            last_sung: None,
        };
        assert!(matches!(blank.validated(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parsed_last_sung_treats_empty_as_absent() {
        let mut fields = SongFields::default();
        assert_eq!(fields.parsed_last_sung().unwrap(), None);

        fields.last_sung = Some(String::new());
        assert_eq!(fields.parsed_last_sung().unwrap(), None);

        fields.last_sung = Some("not a date".into());
        assert!(fields.parsed_last_sung().is_err());
    }
}
