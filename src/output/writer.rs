//! Atomic output publishing
//!
//! Final files are produced under a hidden temporary name in the destination
//! directory and renamed into place only once complete. A dropped staging
//! path deletes its file, so a failed job leaves nothing behind. A video and
//! its manifest are published as a pair: if the second rename fails the
//! first is undone.

use std::io::Write;
use std::path::Path;

use tempfile::{Builder, NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use crate::error::{BeatCutError, BeatCutResult};
use crate::utils::path::PathUtils;

/// Output file writer
pub struct OutputWriter {
    path_utils: PathUtils,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self {
            path_utils: PathUtils::new(),
        }
    }

    /// Reserve a temporary file next to `output`, removed on drop unless published
    pub fn staging_path(&self, output: &Path) -> BeatCutResult<TempPath> {
        let dir = self.path_utils.ensure_parent_dir(output)?;
        let suffix = output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let staging = Builder::new()
            .prefix(".beatcut-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| {
                BeatCutError::assembly(format!("cannot create staging file in {}: {}", dir.display(), e))
            })?
            .into_temp_path();
        debug!("Staging output at {}", staging.display());
        Ok(staging)
    }

    /// Rename a staged file onto its final path
    pub fn publish(&self, staging: TempPath, output: &Path) -> BeatCutResult<()> {
        staging.persist(output).map_err(|e| {
            BeatCutError::assembly(format!("cannot move output into {}: {}", output.display(), e.error))
        })?;
        info!("Output written: {}", output.display());
        Ok(())
    }

    /// Write `bytes` to a synced temporary file next to `output`
    pub fn stage_bytes(&self, output: &Path, bytes: &[u8]) -> BeatCutResult<NamedTempFile> {
        let dir = self.path_utils.ensure_parent_dir(output)?;
        let staged = Builder::new()
            .prefix(".beatcut-")
            .tempfile_in(&dir)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.as_file().sync_all()?;
                Ok(file)
            })
            .map_err(|e| BeatCutError::assembly(format!("cannot stage {}: {}", output.display(), e)))?;
        Ok(staged)
    }

    /// Write `bytes` to `output` atomically
    pub fn write_atomic(&self, output: &Path, bytes: &[u8]) -> BeatCutResult<()> {
        self.stage_bytes(output, bytes)?.persist(output).map_err(|e| {
            BeatCutError::assembly(format!("cannot write {}: {}", output.display(), e.error))
        })?;
        Ok(())
    }

    /// Publish a staged video together with its staged manifest.
    /// Either both land on their final paths or neither does.
    pub fn publish_with_manifest(
        &self,
        video: TempPath,
        output: &Path,
        manifest: NamedTempFile,
        manifest_path: &Path,
    ) -> BeatCutResult<()> {
        self.publish(video, output)?;
        if let Err(e) = manifest.persist(manifest_path) {
            if let Err(remove) = std::fs::remove_file(output) {
                warn!("Cannot withdraw {}: {}", output.display(), remove);
            }
            return Err(BeatCutError::assembly(format!(
                "cannot write manifest {}: {}",
                manifest_path.display(),
                e.error
            )));
        }
        info!("Manifest written: {}", manifest_path.display());
        Ok(())
    }

    /// File size, or zero when the file is missing
    pub fn file_size(&self, path: &Path) -> u64 {
        std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
    }
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new()
    }
}
