//! Song table queries
//!
//! Timestamps are stored as fixed-width RFC 3339 text (see
//! [`songbook_common::time::to_iso`]), so ordering on the column is
//! chronological.

use songbook_common::{time, SongRecord};
use sqlx::{FromRow, SqlitePool};

/// One row of the `songs` table
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SongRow {
    pub id: String,
    pub title: String,
    pub musical_range: String,
    pub audio_path: Option<String>,
    pub last_sung: Option<String>,
    pub created_at: String,
}

impl SongRow {
    /// Wire record; the id is emitted as `_id`
    pub fn into_record(self) -> Result<SongRecord, chrono::ParseError> {
        let last_sung = self
            .last_sung
            .as_deref()
            .map(time::parse_iso)
            .transpose()?;
        let created_at = time::parse_iso(&self.created_at)?;

        Ok(SongRecord {
            id: None,
            object_id: Some(self.id),
            title: self.title,
            musical_range: self.musical_range,
            audio_path: self.audio_path,
            last_sung,
            created_at: Some(created_at),
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, musical_range, audio_path, last_sung, created_at FROM songs";

/// All songs, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<SongRow>, sqlx::Error> {
    sqlx::query_as::<_, SongRow>(&format!(
        "{} ORDER BY created_at DESC, rowid DESC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Songs whose title or range contains `term`, ignoring case, newest first
pub async fn search(pool: &SqlitePool, term: &str) -> Result<Vec<SongRow>, sqlx::Error> {
    sqlx::query_as::<_, SongRow>(&format!(
        "{} WHERE instr(lower(title), lower(?)) > 0 OR instr(lower(musical_range), lower(?)) > 0 \
         ORDER BY created_at DESC, rowid DESC",
        SELECT_COLUMNS
    ))
    .bind(term)
    .bind(term)
    .fetch_all(pool)
    .await
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<SongRow>, sqlx::Error> {
    sqlx::query_as::<_, SongRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &SqlitePool, row: &SongRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO songs (id, title, musical_range, audio_path, last_sung, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.id)
    .bind(&row.title)
    .bind(&row.musical_range)
    .bind(&row.audio_path)
    .bind(&row.last_sung)
    .bind(&row.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrite the mutable columns; returns the number of rows changed
pub async fn update(pool: &SqlitePool, row: &SongRow) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE songs SET title = ?, musical_range = ?, audio_path = ?, last_sung = ? \
         WHERE id = ?",
    )
    .bind(&row.title)
    .bind(&row.musical_range)
    .bind(&row.audio_path)
    .bind(&row.last_sung)
    .bind(&row.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_last_sung(
    pool: &SqlitePool,
    id: &str,
    last_sung: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE songs SET last_sung = ? WHERE id = ?")
        .bind(last_sung)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
