//! Save and load the caption map artifact.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use vscribe_models::CaptionMap;

use crate::error::{StorageError, StorageResult};

/// Default artifact location, relative to the working directory.
pub const DEFAULT_CAPTIONS_PATH: &str = "captions_output.json";

/// Serialize `map` to `path` as 2-space indented JSON.
///
/// The artifact is written to a sibling temp file and renamed into place, so
/// readers never observe a partially written file.
pub async fn save(map: &CaptionMap, path: impl AsRef<Path>) -> StorageResult<()> {
    let path = path.as_ref();

    let mut json = serde_json::to_string_pretty(map).map_err(StorageError::Serialize)?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, json.as_bytes()).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(
        "Saved captions for {} segments ({} frames) to {}",
        map.len(),
        map.frame_count(),
        path.display()
    );
    Ok(())
}

/// Load a caption map, preserving segment and frame order exactly.
pub async fn load(path: impl AsRef<Path>) -> StorageResult<CaptionMap> {
    let path = path.as_ref();

    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let map: CaptionMap =
        serde_json::from_slice(&bytes).map_err(|e| StorageError::format(path, e))?;

    debug!(
        segments = map.len(),
        frames = map.frame_count(),
        "Loaded caption map from {}",
        path.display()
    );
    Ok(map)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A caption artifact at a fixed location.
#[derive(Debug, Clone)]
pub struct CaptionStore {
    path: PathBuf,
}

impl CaptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, map: &CaptionMap) -> StorageResult<()> {
        save(map, &self.path).await
    }

    pub async fn load(&self) -> StorageResult<CaptionMap> {
        load(&self.path).await
    }
}

impl Default for CaptionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTIONS_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vscribe_models::FrameCaption;

    /// 25 s source, 10 s segments, 3 fps.
    fn scenario_map() -> CaptionMap {
        let mut map = CaptionMap::new();
        for (segment, frames) in [("segment_000.mp4", 30), ("segment_001.mp4", 30), ("segment_002.mp4", 15)] {
            let captions = (1..=frames)
                .map(|i| FrameCaption::new(format!("frame_{i:04}.jpg"), format!("{segment} caption {i}")))
                .collect();
            map.insert(segment, captions);
        }
        map
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captions_output.json");
        let map = scenario_map();

        tokio_test::assert_ok!(save(&map, &path).await);
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded, map);
        assert_eq!(
            loaded.segments(),
            vec!["segment_000.mp4", "segment_001.mp4", "segment_002.mp4"]
        );
        let counts: Vec<usize> = loaded.iter().map(|(_, c)| c.len()).collect();
        assert_eq!(counts, vec![30, 30, 15]);
        assert!(!dir.path().join("captions_output.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_round_trip_with_sentinels_and_unicode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("captions.json");

        let mut map = CaptionMap::new();
        map.insert(
            "segment_001.mp4",
            vec![
                FrameCaption::new("frame_0001.jpg", ""),
                FrameCaption::failed("frame_0002.jpg", "Timeout after 120 seconds"),
                FrameCaption::new("frame_0003.jpg", "une femme qui s'étire \"lentement\""),
            ],
        );
        map.insert("segment_000.mp4", Vec::new());

        save(&map, &path).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), map);
    }

    #[tokio::test]
    async fn test_artifact_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captions.json");
        let mut map = CaptionMap::new();
        map.insert("segment_000.mp4", vec![FrameCaption::new("frame_0001.jpg", "a dog")]);

        save(&map, &path).await.unwrap();
        let text = fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            text,
            "{\n  \"segment_000.mp4\": [\n    {\n      \"frame\": \"frame_0001.jpg\",\n      \"caption\": \"a dog\"\n    }\n  ]\n}\n"
        );
    }

    #[tokio::test]
    async fn test_truncated_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captions.json");
        save(&scenario_map(), &path).await.unwrap();

        let text = fs::read_to_string(&path).await.unwrap();
        fs::write(&path, &text[..text.len() / 2]).await.unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(err.is_format_error(), "{err:?}");
    }

    #[tokio::test]
    async fn test_wrong_shapes_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("captions.json");

        for bad in [
            r#"[]"#,
            r#"{"segment_000.mp4": {"frame": "frame_0001.jpg"}}"#,
            r#"{"segment_000.mp4": [{"frame": "frame_0001.jpg"}]}"#,
            r#"{"segment_000.mp4": [], "segment_000.mp4": []}"#,
            "",
        ] {
            fs::write(&path, bad).await.unwrap();
            let err = load(&path).await.unwrap_err();
            assert!(err.is_format_error(), "accepted {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = CaptionStore::new(dir.path().join("none.json")).load().await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
