//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// "connected" once the pool opens, "unavailable" when it cannot
    pub database: String,
}

/// GET /health
///
/// Opens the database pool if no request has done so yet.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.pool().await {
        Ok(_) => "connected",
        Err(_) => "unavailable",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "songbook-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
