//! HTTP API handlers

pub mod health;
pub mod songs;

pub use health::health_routes;
pub use songs::song_routes;
