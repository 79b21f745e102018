//! Song endpoints
//!
//! Create and update accept `multipart/form-data` (with an optional
//! `audioFile` part), urlencoded forms or JSON. Every response is an
//! [`Envelope`]; records carry their id as `_id`.

use axum::{
    async_trait,
    body::Bytes,
    extract::{
        multipart::{Field, MultipartError},
        FromRequest, Multipart, Path, Query, Request, State,
    },
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, patch},
    Form, Json, Router,
};
use serde::Deserialize;
use songbook_common::api::AUDIO_FIELD;
use songbook_common::{time, uuid_utils, DeletedSong, Envelope, SongFields, SongRecord};
use tracing::{debug, info};

use crate::db::songs::{self, SongRow};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const SONG_NOT_FOUND: &str = "Song not found";

/// Media type prefix required for uploads
const AUDIO_MIME_PREFIX: &str = "audio/";

/// Audio part of a create or update request
#[derive(Debug)]
pub struct UploadedAudio {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Body of a create or update request
#[derive(Debug)]
pub struct SongForm {
    pub fields: SongFields,
    pub audio: Option<UploadedAudio>,
}

#[async_trait]
impl FromRequest<AppState> for SongForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            return read_multipart(multipart, state.max_upload_bytes).await;
        }

        let fields = if content_type.starts_with("application/json") {
            Json::<SongFields>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?
                .0
        } else {
            Form::<SongFields>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?
                .0
        };

        Ok(SongForm {
            fields,
            audio: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart, max_bytes: usize) -> ApiResult<SongForm> {
    let mut fields = SongFields::default();
    let mut audio = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => fields.title = field.text().await.map_err(multipart_error)?,
            "musicalRange" => fields.musical_range = field.text().await.map_err(multipart_error)?,
            "lastSung" => fields.last_sung = Some(field.text().await.map_err(multipart_error)?),
            AUDIO_FIELD => audio = read_audio(field, max_bytes).await?,
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(SongForm { fields, audio })
}

/// Read the file part; an empty part with no file name means "no file"
async fn read_audio(field: Field<'_>, max_bytes: usize) -> ApiResult<Option<UploadedAudio>> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().unwrap_or_default().to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if bytes.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
        return Ok(None);
    }
    if !content_type.starts_with(AUDIO_MIME_PREFIX) {
        return Err(ApiError::BadRequest("Only audio files are allowed!".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Audio file exceeds the {} byte limit",
            max_bytes
        )));
    }

    Ok(Some(UploadedAudio {
        file_name,
        content_type,
        bytes,
    }))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound(SONG_NOT_FOUND.to_string())
}

fn to_record(row: SongRow) -> ApiResult<SongRecord> {
    row.into_record()
        .map_err(|e| ApiError::Internal(format!("Stored timestamp is invalid: {}", e)))
}

fn to_records(rows: Vec<SongRow>) -> ApiResult<Vec<SongRecord>> {
    rows.into_iter().map(to_record).collect()
}

/// Store the uploaded file, if any, returning its public path
async fn store_audio(state: &AppState, audio: Option<&UploadedAudio>) -> ApiResult<Option<String>> {
    match audio {
        Some(audio) => {
            let path = state
                .uploads
                .save(audio.file_name.as_deref(), &audio.bytes)
                .await?;
            info!(
                path = %path,
                content_type = %audio.content_type,
                size = audio.bytes.len(),
                "Stored audio upload"
            );
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

/// GET /api/songs
pub async fn list_songs(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<SongRecord>>>> {
    let pool = state.db.pool().await?;
    let rows = songs::list(pool).await?;
    debug!(count = rows.len(), "Listed songs");
    Ok(Json(Envelope::ok(to_records(rows)?)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

/// GET /api/songs/search?q=term
pub async fn search_songs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Envelope<Vec<SongRecord>>>> {
    let term = params.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(ApiError::BadRequest("Please provide a search query".to_string()));
    }

    let pool = state.db.pool().await?;
    let rows = songs::search(pool, term).await?;
    debug!(term, count = rows.len(), "Searched songs");
    Ok(Json(Envelope::ok(to_records(rows)?)))
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<SongRecord>>> {
    let pool = state.db.pool().await?;
    let row = songs::find(pool, &id).await?.ok_or_else(not_found)?;
    Ok(Json(Envelope::ok(to_record(row)?)))
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<AppState>,
    form: SongForm,
) -> ApiResult<(StatusCode, Json<Envelope<SongRecord>>)> {
    let fields = form.fields.validated()?;
    let last_sung = fields.parsed_last_sung()?;
    let pool = state.db.pool().await?;

    let audio_path = store_audio(&state, form.audio.as_ref()).await?;
    let row = SongRow {
        id: uuid_utils::generate_compact(),
        title: fields.title,
        musical_range: fields.musical_range,
        audio_path,
        last_sung: last_sung.as_ref().map(time::to_iso),
        created_at: time::to_iso(&time::now()),
    };

    if let Err(e) = songs::insert(pool, &row).await {
        if let Some(path) = &row.audio_path {
            state.uploads.remove(path).await;
        }
        return Err(e.into());
    }

    info!(id = %row.id, title = %row.title, "Created song");
    Ok((StatusCode::CREATED, Json(Envelope::ok(to_record(row)?))))
}

/// PUT /api/songs/:id
///
/// `lastSung` and the audio file keep their stored values when not sent.
/// A replaced audio file is deleted from the uploads directory.
pub async fn update_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: SongForm,
) -> ApiResult<Json<Envelope<SongRecord>>> {
    let fields = form.fields.validated()?;
    let last_sung = fields.parsed_last_sung()?;
    let pool = state.db.pool().await?;

    let existing = songs::find(pool, &id).await?.ok_or_else(not_found)?;
    let new_audio = store_audio(&state, form.audio.as_ref()).await?;

    let row = SongRow {
        id: existing.id.clone(),
        title: fields.title,
        musical_range: fields.musical_range,
        audio_path: new_audio.clone().or_else(|| existing.audio_path.clone()),
        last_sung: last_sung
            .as_ref()
            .map(time::to_iso)
            .or_else(|| existing.last_sung.clone()),
        created_at: existing.created_at.clone(),
    };

    let updated = match songs::update(pool, &row).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(path) = &new_audio {
                state.uploads.remove(path).await;
            }
            return Err(e.into());
        }
    };
    if updated == 0 {
        // Deleted concurrently
        if let Some(path) = &new_audio {
            state.uploads.remove(path).await;
        }
        return Err(not_found());
    }

    if new_audio.is_some() {
        if let Some(old) = &existing.audio_path {
            state.uploads.remove(old).await;
        }
    }

    info!(id = %row.id, "Updated song");
    Ok(Json(Envelope::ok(to_record(row)?)))
}

/// PATCH /api/songs/:id/mark-sung
pub async fn mark_song_sung(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<SongRecord>>> {
    let pool = state.db.pool().await?;
    let now = time::to_iso(&time::now());

    if songs::set_last_sung(pool, &id, &now).await? == 0 {
        return Err(not_found());
    }
    let row = songs::find(pool, &id).await?.ok_or_else(not_found)?;

    info!(id = %id, last_sung = %now, "Marked song as sung");
    Ok(Json(Envelope::ok(to_record(row)?)))
}

/// DELETE /api/songs/:id
pub async fn delete_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<DeletedSong>>> {
    let pool = state.db.pool().await?;
    let existing = songs::find(pool, &id).await?.ok_or_else(not_found)?;

    if songs::delete(pool, &id).await? == 0 {
        return Err(not_found());
    }
    if let Some(path) = &existing.audio_path {
        state.uploads.remove(path).await;
    }

    info!(id = %id, "Deleted song");
    Ok(Json(Envelope::ok(DeletedSong { id })))
}

pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/api/songs", get(list_songs).post(create_song))
        .route("/api/songs/search", get(search_songs))
        .route(
            "/api/songs/:id",
            get(get_song).put(update_song).delete(delete_song),
        )
        .route("/api/songs/:id/mark-sung", patch(mark_song_sung))
}
