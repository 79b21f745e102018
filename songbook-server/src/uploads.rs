//! Audio upload storage
//!
//! Files are written under the uploads directory as `<uuid><ext>` and
//! served back at `/uploads/<name>`.

use songbook_common::uuid_utils;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// URL prefix under which stored files are served
pub const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh name and return its public path
    ///
    /// The extension of `original_name` is kept when it is plain alphanumeric.
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!("{}{}", uuid_utils::generate_id(), extension_of(original_name));
        tokio::fs::write(self.dir.join(&name), bytes).await?;

        debug!(name = %name, size = bytes.len(), "Stored uploaded audio");
        Ok(format!("{}{}", PUBLIC_PREFIX, name))
    }

    /// Local file behind a public path, `None` for foreign or unsafe paths
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let name = public_path.strip_prefix(PUBLIC_PREFIX)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Remove the file behind a public path
    ///
    /// Missing files are ignored and other failures are only logged; the
    /// song change that superseded the file has already been committed.
    pub async fn remove(&self, public_path: &str) {
        let Some(path) = self.resolve(public_path) else {
            warn!(public_path, "Refusing to remove file outside uploads directory");
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed audio file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove audio file"),
        }
    }
}

fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
