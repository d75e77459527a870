//! Filesystem helpers for decoder output directories.
//!
//! The decoder writes numbered files (`segment_%03d.mp4`, `frame_%04d.jpg`).
//! These helpers list them ordered by their parsed index, never by name or
//! modification time, and clear leftovers from earlier runs.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// List files in `dir` whose name `parse` accepts, sorted by the parsed index.
pub async fn list_indexed<T, F>(dir: &Path, parse: F) -> MediaResult<Vec<(T, PathBuf)>>
where
    T: Ord,
    F: Fn(&Path) -> Option<T>,
{
    let mut found = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(index) = parse(&path) {
            found.push((index, path));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Remove files in `dir` whose name `parse` accepts. Returns how many were removed.
pub async fn remove_indexed<T, F>(dir: &Path, parse: F) -> MediaResult<usize>
where
    T: Ord,
    F: Fn(&Path) -> Option<T>,
{
    if !dir.exists() {
        return Ok(0);
    }

    let stale = list_indexed(dir, parse).await?;
    for (_, path) in &stale {
        fs::remove_file(path).await?;
    }

    if !stale.is_empty() {
        tracing::debug!("Removed {} stale files from {}", stale.len(), dir.display());
    }
    Ok(stale.len())
}
