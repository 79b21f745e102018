//! songbook-server library - songs HTTP API
//!
//! Stores songs in SQLite and uploaded audio on disk, serving both over a
//! JSON envelope API plus static `/uploads`.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use songbook_common::config::ServerConfig;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod uploads;

pub use db::Database;
pub use error::{ApiError, ApiResult};
pub use uploads::UploadStore;

/// Room left in the request body limit for multipart framing and text fields
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lazily opened database
    pub db: Database,
    pub uploads: UploadStore,
    /// Largest accepted audio file
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(db: Database, uploads: UploadStore, max_upload_bytes: usize) -> Self {
        Self {
            db,
            uploads,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Database::new(config.database_url.clone()),
            UploadStore::new(config.uploads_dir.clone()),
            config.max_upload_bytes,
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads.dir());
    let body_limit = state.max_upload_bytes.saturating_add(BODY_OVERHEAD_BYTES);

    Router::new()
        .merge(api::song_routes())
        .merge(api::health_routes())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
