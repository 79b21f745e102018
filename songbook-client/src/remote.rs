//! Songs API client
//!
//! Maps each song operation onto one HTTP call and unwraps the response
//! envelope. Every response body is read as text first and then parsed, so
//! a non-JSON body and an envelope with `success: false` both surface as
//! [`RemoteError::OperationFailed`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use songbook_common::api::AUDIO_FIELD;
use songbook_common::config::ClientConfig;
use songbook_common::{AudioFile, DeletedSong, Envelope, SongFields, SongRecord};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::RemoteError;

const USER_AGENT: &str = concat!("songbook/", env!("CARGO_PKG_VERSION"));

/// Remote song operations
///
/// Records come back in server shape; converting them into entities is
/// left to the caller.
#[async_trait]
pub trait SongRemote: Send + Sync {
    /// All songs, newest first
    async fn list(&self) -> Result<Vec<SongRecord>, RemoteError>;

    /// One song by id
    async fn get(&self, id: &str) -> Result<SongRecord, RemoteError>;

    /// Create a song, uploading `audio` when present
    async fn create(
        &self,
        fields: &SongFields,
        audio: Option<&AudioFile>,
    ) -> Result<SongRecord, RemoteError>;

    /// Replace an existing song's fields, uploading `audio` when present
    async fn update(
        &self,
        id: &str,
        fields: &SongFields,
        audio: Option<&AudioFile>,
    ) -> Result<SongRecord, RemoteError>;

    /// Stamp `last_sung` with the server's current time
    async fn mark_sung(&self, id: &str) -> Result<SongRecord, RemoteError>;

    async fn delete(&self, id: &str) -> Result<DeletedSong, RemoteError>;

    /// Songs whose title or range contains `query` (case-insensitive), newest first
    async fn search(&self, query: &str) -> Result<Vec<SongRecord>, RemoteError>;
}

/// reqwest-backed songs API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://host/api`)
    ///
    /// `timeout` bounds each whole request; expiry is a transport failure.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            RemoteError::OperationFailed(format!("Invalid API URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::OperationFailed(format!(
                "API URL cannot be used as a base: {}",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        Self::new(&config.api_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Attach song fields as a urlencoded form, or as multipart when a file
    /// is present
    fn with_song_body(
        request: RequestBuilder,
        fields: &SongFields,
        audio: Option<&AudioFile>,
    ) -> Result<RequestBuilder, RemoteError> {
        let Some(file) = audio else {
            return Ok(request.form(fields));
        };

        let mut form = Form::new()
            .text("title", fields.title.clone())
            .text("musicalRange", fields.musical_range.clone());
        if let Some(last_sung) = &fields.last_sung {
            form = form.text("lastSung", last_sung.clone());
        }

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| {
                RemoteError::Validation(format!(
                    "Invalid audio content type '{}': {}",
                    file.content_type, e
                ))
            })?;

        debug!(
            file_name = %file.file_name,
            content_type = %file.content_type,
            size = file.len(),
            "Attaching audio file as multipart upload"
        );

        Ok(request.multipart(form.part(AUDIO_FIELD, part)))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(|e| {
            error!(operation, error = %e, "Songs API request failed");
            RemoteError::from(e)
        })?;

        read_envelope(response).await.map_err(|e| {
            error!(operation, error = %e, "Songs API returned an error");
            e
        })
    }
}

/// Read the body as text, then parse and unwrap the envelope
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        return Err(match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            StatusCode::BAD_REQUEST => RemoteError::Validation(message),
            _ => RemoteError::OperationFailed(format!(
                "API error {}: {}",
                status.as_u16(),
                message
            )),
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
        RemoteError::OperationFailed(format!("Server returned invalid JSON: {}", e))
    })?;

    envelope.into_data().map_err(RemoteError::OperationFailed)
}

#[async_trait]
impl SongRemote for ApiClient {
    async fn list(&self) -> Result<Vec<SongRecord>, RemoteError> {
        debug!("Fetching songs from API");
        let request = self.http_client.get(self.endpoint(&["songs"]));
        let records: Vec<SongRecord> = self.send(request, "list").await?;
        info!(count = records.len(), "Retrieved songs from API");
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<SongRecord, RemoteError> {
        let request = self.http_client.get(self.endpoint(&["songs", id]));
        self.send(request, "get").await
    }

    async fn create(
        &self,
        fields: &SongFields,
        audio: Option<&AudioFile>,
    ) -> Result<SongRecord, RemoteError> {
        debug!(title = %fields.title, with_audio = audio.is_some(), "Creating song via API");
        let request = Self::with_song_body(
            self.http_client.post(self.endpoint(&["songs"])),
            fields,
            audio,
        )?;
        self.send(request, "create").await
    }

    async fn update(
        &self,
        id: &str,
        fields: &SongFields,
        audio: Option<&AudioFile>,
    ) -> Result<SongRecord, RemoteError> {
        debug!(id, with_audio = audio.is_some(), "Updating song via API");
        let request = Self::with_song_body(
            self.http_client.put(self.endpoint(&["songs", id])),
            fields,
            audio,
        )?;
        self.send(request, "update").await
    }

    async fn mark_sung(&self, id: &str) -> Result<SongRecord, RemoteError> {
        debug!(id, "Marking song as sung via API");
        let request = self
            .http_client
            .patch(self.endpoint(&["songs", id, "mark-sung"]));
        self.send(request, "mark_sung").await
    }

    async fn delete(&self, id: &str) -> Result<DeletedSong, RemoteError> {
        debug!(id, "Deleting song via API");
        let request = self.http_client.delete(self.endpoint(&["songs", id]));
        self.send(request, "delete").await
    }

    async fn search(&self, query: &str) -> Result<Vec<SongRecord>, RemoteError> {
        debug!(query, "Searching songs via API");
        let request = self
            .http_client
            .get(self.endpoint(&["songs", "search"]))
            .query(&[("q", query)]);
        self.send(request, "search").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new("http://localhost:3000/api", Duration::from_secs(10));
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ApiClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(ApiClient::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let client = ApiClient::new("http://localhost:3000/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&["songs", "abc", "mark-sung"]).as_str(),
            "http://localhost:3000/api/songs/abc/mark-sung"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash_and_encoding() {
        let client = ApiClient::new("http://localhost:3000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(&["songs", "a b/c"]).as_str(),
            "http://localhost:3000/api/songs/a%20b%2Fc"
        );
    }
}
