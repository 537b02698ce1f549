// Probe LibAV adapter - Clip durations read through the linked libav libraries

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::adapters::probe_ffprobe::FfprobeAdapter;
use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::ProbePort;

/// LibAV-based probing adapter. Audio decoding still goes through the ffmpeg pipe.
pub struct ProbeLibavAdapter {
    decoder: FfprobeAdapter,
}

impl ProbeLibavAdapter {
    /// Initialize libav and locate the decoding binaries
    pub fn new() -> BeatCutResult<Self> {
        ffmpeg_next::init().map_err(|e| BeatCutError::config(format!("libav init failed: {}", e)))?;
        Ok(Self {
            decoder: FfprobeAdapter::new()?,
        })
    }

    fn read_duration(path: PathBuf) -> Result<f64, String> {
        let ictx = ffmpeg_next::format::input(&path).map_err(|e| e.to_string())?;

        let is_video = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| matches!(ext.as_str(), "mp4" | "mov" | "mkv" | "webm" | "m4v" | "avi"))
            .unwrap_or(false);
        if is_video && ictx.streams().best(ffmpeg_next::media::Type::Video).is_none() {
            return Err("no video stream".to_string());
        }

        let duration = ictx.duration();
        if duration <= 0 {
            return Err("duration unavailable".to_string());
        }
        Ok(duration as f64 / ffmpeg_next::ffi::AV_TIME_BASE as f64)
    }
}

#[async_trait]
impl ProbePort for ProbeLibavAdapter {
    async fn probe_duration(&self, path: &Path) -> BeatCutResult<f64> {
        let owned = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || Self::read_duration(owned))
            .await
            .map_err(|e| BeatCutError::ProbeFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        result.map_err(|message| BeatCutError::ProbeFailed {
            path: path.display().to_string(),
            message,
        })
    }

    async fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        max_seconds: f64,
    ) -> BeatCutResult<Vec<f32>> {
        self.decoder.decode_audio(path, sample_rate, max_seconds).await
    }
}
