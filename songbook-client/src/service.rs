//! Song service with local-storage fallback
//!
//! Starts in [`ServiceMode::Remote`]. The first failed remote call flips the
//! service to [`ServiceMode::Degraded`] for the rest of its lifetime, and the
//! operation that failed is retried against local storage right away.
//! Failures while degraded go straight to the caller.
//!
//! Operations take the caller's collection by value and return the new
//! collection; the service keeps no copy between calls. One mutex guards
//! the mode flag and the storage slot, so calls on the same instance run one
//! at a time.

use songbook_common::config::ClientConfig;
use songbook_common::{Song, SongFields, SongRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{RemoteError, ServiceError};
use crate::remote::{ApiClient, SongRemote};
use crate::storage::{FileStore, KeyValueStore, LocalSongStore};

/// Where operations are served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Songs API (initial)
    Remote,
    /// Local storage only; permanent once entered
    Degraded,
}

/// Song operations over the API with a local-storage fallback
pub struct SongService<R = ApiClient, S = FileStore> {
    remote: R,
    local: LocalSongStore<S>,
    mode: Mutex<ServiceMode>,
}

impl SongService<ApiClient, FileStore> {
    /// API client and file-backed storage from resolved settings
    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceError> {
        let remote = ApiClient::from_config(config)?;
        let local = LocalSongStore::new(FileStore::new(&config.storage_dir));
        info!(
            api_url = %config.api_url,
            storage_dir = %config.storage_dir.display(),
            "Song service configured"
        );
        Ok(Self::new(remote, local))
    }
}

impl<R: SongRemote, S: KeyValueStore> SongService<R, S> {
    pub fn new(remote: R, local: LocalSongStore<S>) -> Self {
        Self {
            remote,
            local,
            mode: Mutex::new(ServiceMode::Remote),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &LocalSongStore<S> {
        &self.local
    }

    pub async fn mode(&self) -> ServiceMode {
        *self.mode.lock().await
    }

    pub async fn is_degraded(&self) -> bool {
        self.mode().await == ServiceMode::Degraded
    }

    fn degrade(mode: &mut ServiceMode, operation: &str, error: &RemoteError) {
        warn!(
            operation,
            error = %error,
            "Songs API unavailable, falling back to local storage"
        );
        *mode = ServiceMode::Degraded;
    }

    /// All songs: from the API, or from local storage when degraded
    pub async fn get_songs(&self) -> Result<Vec<Song>, ServiceError> {
        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            match self.remote.list().await.and_then(into_songs) {
                Ok(songs) => return Ok(songs),
                Err(e) => Self::degrade(&mut mode, "get_songs", &e),
            }
        }

        debug!("Using local storage to get songs");
        Ok(self.local.load().await)
    }

    /// Persist `songs` locally; a no-op while the API is in use
    pub async fn save_songs(&self, songs: &[Song]) -> Result<(), ServiceError> {
        let mode = self.mode.lock().await;
        if *mode == ServiceMode::Degraded {
            self.local.save(songs).await?;
        }
        Ok(())
    }

    /// Add `song`; via the API the server's record replaces it
    pub async fn add_song(&self, song: Song, mut songs: Vec<Song>) -> Result<Vec<Song>, ServiceError> {
        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            let fields = SongFields::from(&song);
            match self
                .remote
                .create(&fields, song.audio.pending())
                .await
                .and_then(into_song)
            {
                Ok(created) => {
                    info!(id = %created.id, title = %created.title, "Created song via API");
                    songs.push(created);
                    return Ok(songs);
                }
                Err(e) => Self::degrade(&mut mode, "add_song", &e),
            }
        }

        debug!(id = %song.id, "Using local storage to add song");
        songs.push(song);
        self.local.save(&songs).await?;
        Ok(songs)
    }

    /// Replace the song with `updated.id`
    pub async fn update_song(
        &self,
        updated: Song,
        songs: Vec<Song>,
    ) -> Result<Vec<Song>, ServiceError> {
        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            let fields = SongFields::from(&updated);
            match self
                .remote
                .update(&updated.id, &fields, updated.audio.pending())
                .await
                .and_then(into_song)
            {
                Ok(server_song) => {
                    info!(id = %updated.id, "Updated song via API");
                    return Ok(replace_by_id(songs, &updated.id, server_song));
                }
                Err(e) => Self::degrade(&mut mode, "update_song", &e),
            }
        }

        debug!(id = %updated.id, "Using local storage to update song");
        let id = updated.id.clone();
        let songs = replace_by_id(songs, &id, updated);
        self.local.save(&songs).await?;
        Ok(songs)
    }

    /// Stamp the song as sung now
    ///
    /// The server's clock is used via the API, the local clock otherwise.
    /// An unknown id leaves a local collection unchanged.
    pub async fn mark_song_as_sung(
        &self,
        id: &str,
        mut songs: Vec<Song>,
    ) -> Result<Vec<Song>, ServiceError> {
        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            match self.remote.mark_sung(id).await.and_then(into_song) {
                Ok(server_song) => {
                    info!(id, "Marked song as sung via API");
                    return Ok(replace_by_id(songs, id, server_song));
                }
                Err(e) => Self::degrade(&mut mode, "mark_song_as_sung", &e),
            }
        }

        debug!(id, "Using local storage to mark song as sung");
        match songs.iter().position(|song| song.id == id) {
            Some(index) => songs[index].mark_sung(),
            None => return Ok(songs),
        }
        self.local.save(&songs).await?;
        Ok(songs)
    }

    /// Remove the song with `id`
    ///
    /// Removing an unknown id from a local collection is a no-op.
    pub async fn remove_song(&self, id: &str, songs: Vec<Song>) -> Result<Vec<Song>, ServiceError> {
        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            match self.remote.delete(id).await {
                Ok(deleted) => {
                    info!(id = %deleted.id, "Removed song via API");
                    return Ok(remove_by_id(songs, id));
                }
                Err(e) => Self::degrade(&mut mode, "remove_song", &e),
            }
        }

        debug!(id, "Using local storage to remove song");
        let songs = remove_by_id(songs, id);
        self.local.save(&songs).await?;
        Ok(songs)
    }

    /// Search by title or range
    ///
    /// A blank query returns all songs. The API matches the query as one
    /// substring; local search matches if any whitespace-separated term
    /// appears in the title or the range.
    pub async fn search_songs(
        &self,
        query: &str,
        songs: Vec<Song>,
    ) -> Result<Vec<Song>, ServiceError> {
        if query.trim().is_empty() {
            return self.get_songs().await;
        }

        let mut mode = self.mode.lock().await;

        if *mode == ServiceMode::Remote {
            match self.remote.search(query).await.and_then(into_songs) {
                Ok(found) => {
                    debug!(query, count = found.len(), "API search complete");
                    return Ok(found);
                }
                Err(e) => Self::degrade(&mut mode, "search_songs", &e),
            }
        }

        debug!(query, "Using local storage for song search");
        Ok(search_local(query, songs))
    }
}

fn into_song(record: SongRecord) -> Result<Song, RemoteError> {
    Song::try_from(record).map_err(RemoteError::from)
}

fn into_songs(records: Vec<SongRecord>) -> Result<Vec<Song>, RemoteError> {
    records.into_iter().map(into_song).collect()
}

fn replace_by_id(songs: Vec<Song>, id: &str, replacement: Song) -> Vec<Song> {
    songs
        .into_iter()
        .map(|song| {
            if song.id == id {
                replacement.clone()
            } else {
                song
            }
        })
        .collect()
}

fn remove_by_id(songs: Vec<Song>, id: &str) -> Vec<Song> {
    songs.into_iter().filter(|song| song.id != id).collect()
}

/// Filter `songs` by any query term appearing in title or range
pub fn search_local(query: &str, songs: Vec<Song>) -> Vec<Song> {
    let query = query.to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();

    songs
        .into_iter()
        .filter(|song| {
            let title = song.title.to_lowercase();
            let range = song.musical_range.to_lowercase();
            terms
                .iter()
                .any(|term| title.contains(term) || range.contains(term))
        })
        .collect()
}
