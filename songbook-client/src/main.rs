//! songbook - command-line client for the songs API
//!
//! Loads the current collection through the song service (API first, local
//! storage when the API is unreachable), applies one operation and prints
//! the resulting collection.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use songbook_client::SongService;
use songbook_common::config::{load_toml_config, ClientConfig};
use songbook_common::{AudioFile, AudioRef, Song};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "songbook", version, about = "Manage a songbook via the songs API")]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Songs API base URL (e.g. http://localhost:3000/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory for local fallback storage
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all songs
    List,
    /// Search songs by title or range
    Search { query: String },
    /// Add a song
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        range: String,
        /// Audio file to upload
        #[arg(long)]
        audio: Option<PathBuf>,
    },
    /// Update a song's title, range or audio
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        range: Option<String>,
        #[arg(long)]
        audio: Option<PathBuf>,
    },
    /// Mark a song as sung now
    MarkSung { id: String },
    /// Remove a song
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml = load_toml_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::resolve(&toml, cli.api_url.as_deref(), cli.storage_dir.as_deref());
    let service = SongService::from_config(&config)?;

    let songs = service.get_songs().await?;

    let songs = match cli.command {
        Command::List => songs,
        Command::Search { query } => service.search_songs(&query, songs).await?,
        Command::Add { title, range, audio } => {
            let mut song = Song::new(title, range);
            if let Some(path) = audio {
                song = song.with_audio(AudioRef::Pending(read_audio_file(&path)?));
            }
            service.add_song(song, songs).await?
        }
        Command::Update {
            id,
            title,
            range,
            audio,
        } => {
            let mut song = songs
                .iter()
                .find(|song| song.id == id)
                .cloned()
                .with_context(|| format!("No song with id {}", id))?;
            if let Some(title) = title {
                song.title = title;
            }
            if let Some(range) = range {
                song.musical_range = range;
            }
            if let Some(path) = audio {
                song.audio = AudioRef::Pending(read_audio_file(&path)?);
            }
            service.update_song(song, songs).await?
        }
        Command::MarkSung { id } => service.mark_song_as_sung(&id, songs).await?,
        Command::Remove { id } => service.remove_song(&id, songs).await?,
    };

    if service.is_degraded().await {
        info!("Songs API unavailable; changes were kept in local storage");
    }

    print_songs(&songs);
    Ok(())
}

/// Read an audio file, sniffing its media type from the contents
fn read_audio_file(path: &Path) -> Result<AudioFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read audio file {}", path.display()))?;
    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());

    Ok(AudioFile::new(file_name, content_type, bytes))
}

fn print_songs(songs: &[Song]) {
    let now = Utc::now();
    for song in songs {
        let audio = match &song.audio {
            AudioRef::None => "-".to_string(),
            AudioRef::Pending(file) => format!("{} (not uploaded)", file.file_name),
            AudioRef::Stored(path) => path.clone(),
        };
        println!(
            "{}\t{}\t{}\t{}\t{}",
            song.id,
            song.title,
            song.musical_range,
            song.format_last_sung(now),
            audio
        );
    }
}
