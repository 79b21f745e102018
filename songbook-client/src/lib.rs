//! songbook-client library
//!
//! Client-side access to the songs API with a local-storage fallback:
//! - [`remote`]: request/response mapping for the songs API
//! - [`storage`]: durable key-value slot holding the local collection
//! - [`service`]: per-operation choice between the API and local storage

pub mod error;
pub mod remote;
pub mod service;
pub mod storage;

pub use error::{RemoteError, ServiceError, StoreError};
pub use remote::{ApiClient, SongRemote};
pub use service::{ServiceMode, SongService};
pub use storage::{FileStore, KeyValueStore, LocalSongStore, MemoryStore, StoredSong, STORAGE_KEY};
