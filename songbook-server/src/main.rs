//! songbook-server - HTTP API for the songbook
//!
//! Serves the songs API and uploaded audio. The database is opened on the
//! first request that needs it.

use anyhow::{Context, Result};
use clap::Parser;
use songbook_common::config::{load_toml_config, ServerConfig};
use songbook_server::{build_router, db, AppState};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "songbook-server", version, about = "Songs HTTP API")]
struct Cli {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (e.g. 127.0.0.1:3000)
    #[arg(long)]
    bind: Option<String>,
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
        .init();

    info!("Starting songbook-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::resolve(&toml, cli.bind.as_deref());

    std::fs::create_dir_all(&config.uploads_dir).with_context(|| {
        format!("Failed to create uploads directory {}", config.uploads_dir.display())
    })?;
    if let Some(parent) = db::sqlite_file_path(&config.database_url)
        .as_deref()
        .and_then(|path| path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }

    info!("Database: {}", config.database_url);
    info!("Uploads: {}", config.uploads_dir.display());

    let app = build_router(AppState::from_config(&config));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("songbook-server listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
