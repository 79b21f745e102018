//! Wire types shared by the songbook client and server
//!
//! Every endpoint wraps its payload in an [`Envelope`]. Song payloads use the
//! server-side field names ([`SongRecord`]); create/update requests carry
//! [`SongFields`].

pub mod types;

pub use types::{
    DeletedSong, Envelope, RecordError, SongFields, SongRecord, AUDIO_FIELD,
    DEFAULT_FAILURE_MESSAGE,
};
