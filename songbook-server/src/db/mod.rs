//! Database access layer
//!
//! The connection pool is created lazily on first use and reused by every
//! later request. The schema is created when the pool is first opened.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub mod songs;

pub use songs::SongRow;

/// Lazily connected SQLite database
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

#[derive(Debug)]
struct DatabaseInner {
    url: String,
    pool: OnceCell<SqlitePool>,
}

impl Database {
    /// Database at `url`; nothing is opened until [`Database::pool`] is called
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                url: url.into(),
                pool: OnceCell::new(),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the pool has been opened
    pub fn is_connected(&self) -> bool {
        self.inner.pool.initialized()
    }

    /// Shared pool, connecting on first call
    ///
    /// A failed attempt leaves the cell empty so the next call retries.
    pub async fn pool(&self) -> Result<&SqlitePool, sqlx::Error> {
        self.inner
            .pool
            .get_or_try_init(|| connect(&self.inner.url))
            .await
    }
}

/// Open a pool and create the schema
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    // Each in-memory connection is its own database; keep exactly one alive
    let pool = if is_memory_url(url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    create_schema(&pool).await?;
    info!(url, "Connected to database");
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            musical_range TEXT NOT NULL,
            audio_path TEXT,
            last_sung TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_created_at ON songs(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// File backing a `sqlite:` URL, `None` for in-memory databases
pub fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    if is_memory_url(url) {
        return None;
    }
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
