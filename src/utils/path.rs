//! Path utilities for clip naming, concat lists and output placement

use crate::error::{BeatCutError, BeatCutResult};
use std::path::{Path, PathBuf};

/// Path helpers used across the pipeline
pub struct PathUtils;

impl PathUtils {
    /// Create a new path utils instance
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PathUtils {
    fn default() -> Self {
        Self::new()
    }
}

impl PathUtils {
    /// Get lowercase file extension from path
    pub fn get_extension(&self, path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Identifier of a media file: its stem
    pub fn media_id(&self, path: &Path) -> Option<String> {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
    }

    /// Whether the file extension is in `extensions` (case-insensitive)
    pub fn has_extension(&self, path: &Path, extensions: &[String]) -> bool {
        self.get_extension(path)
            .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false)
    }

    /// One line of an ffmpeg concat-demuxer list
    pub fn concat_entry(&self, path: &Path) -> String {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        format!("file '{}'", escaped)
    }

    /// Default manifest location next to the video: `clip.mp4` -> `clip.manifest.json`
    pub fn manifest_path_for(&self, output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        output.with_file_name(format!("{}.manifest.json", stem))
    }

    /// Directory an output file lands in, created if missing
    pub fn ensure_parent_dir(&self, path: &Path) -> BeatCutResult<PathBuf> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| BeatCutError::Assembly {
            message: format!("cannot create output directory {}: {}", parent.display(), e),
        })?;
        Ok(parent)
    }
}
