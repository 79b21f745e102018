//! # Songbook Common Library
//!
//! Shared code for the songbook client and server including:
//! - The song entity model and its audio reference
//! - Wire types (response envelope, song records, form fields)
//! - Configuration loading
//! - Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod song;
pub mod time;
pub mod uuid_utils;

pub use api::{DeletedSong, Envelope, RecordError, SongFields, SongRecord};
pub use error::{Error, Result};
pub use song::{AudioFile, AudioRef, Song};
