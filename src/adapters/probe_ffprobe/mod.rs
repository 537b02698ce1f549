//! FFprobe adapter for media file probing
//!
//! Durations come from `ffprobe` JSON; audio is decoded to raw mono f32 by
//! piping through `ffmpeg`. Motion is measured on small grayscale frames
//! from the first second of a clip.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::ProbePort;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Duration from ffprobe JSON: container duration, else the longest stream.
/// Video files must carry a video stream with known dimensions.
pub fn parse_probe_duration(json: &[u8], require_video: bool) -> Result<f64, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    if require_video {
        let has_video = probe.streams.iter().any(|s| {
            s.codec_type.as_deref() == Some("video") && s.width.is_some() && s.height.is_some()
        });
        if !has_video {
            return Err("no video stream with known dimensions".to_string());
        }
    }

    let container = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok());
    let longest_stream = probe
        .streams
        .iter()
        .filter_map(|s| s.duration.as_ref().and_then(|d| d.parse::<f64>().ok()))
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.max(d))));

    match container.or(longest_stream) {
        Some(duration) if duration.is_finite() && duration > 0.0 => Ok(duration),
        _ => Err("duration unavailable".to_string()),
    }
}

/// Little-endian f32 samples from raw bytes
pub fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Motion analysis frame geometry and rate
const MOTION_WIDTH: usize = 160;
const MOTION_HEIGHT: usize = 90;
const MOTION_FPS: u32 = 15;

/// Mean absolute difference between consecutive 8-bit gray frames, scaled to 0..=1.
/// Fewer than two whole frames give 0.
pub fn motion_from_gray_frames(bytes: &[u8], frame_len: usize) -> f64 {
    if frame_len == 0 {
        return 0.0;
    }
    let frames: Vec<&[u8]> = bytes.chunks_exact(frame_len).collect();
    if frames.len() < 2 {
        return 0.0;
    }

    let total: f64 = frames
        .windows(2)
        .map(|pair| {
            let sum: u64 = pair[0]
                .iter()
                .zip(pair[1])
                .map(|(a, b)| u64::from(a.abs_diff(*b)))
                .sum();
            sum as f64 / frame_len as f64
        })
        .sum();
    (total / (frames.len() - 1) as f64 / 255.0).clamp(0.0, 1.0)
}

/// FFprobe-based probe adapter
pub struct FfprobeAdapter {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
}

impl FfprobeAdapter {
    /// Create adapter using ffprobe and ffmpeg from PATH
    pub fn new() -> BeatCutResult<Self> {
        let ffprobe = which::which("ffprobe").map_err(|_| BeatCutError::FfmpegNotFound {
            tool: "ffprobe".to_string(),
        })?;
        let ffmpeg = which::which("ffmpeg").map_err(|_| BeatCutError::FfmpegNotFound {
            tool: "ffmpeg".to_string(),
        })?;
        Ok(Self { ffprobe, ffmpeg })
    }

    fn is_video_path(path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                matches!(ext.as_str(), "mp4" | "mov" | "mkv" | "webm" | "m4v" | "avi")
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProbePort for FfprobeAdapter {
    async fn probe_duration(&self, path: &Path) -> BeatCutResult<f64> {
        let probe_error = |message: String| BeatCutError::ProbeFailed {
            path: path.display().to_string(),
            message,
        };

        if !path.is_file() {
            return Err(probe_error("file not found".to_string()));
        }

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(probe_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_duration(&output.stdout, Self::is_video_path(path)).map_err(probe_error)
    }

    async fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        max_seconds: f64,
    ) -> BeatCutResult<Vec<f32>> {
        if !path.is_file() {
            return Err(BeatCutError::AudioUnreadable {
                message: format!("{} does not exist", path.display()),
            });
        }

        debug!("Decoding {} at {} Hz", path.display(), sample_rate);
        let output = Command::new(&self.ffmpeg)
            .args(["-nostdin", "-hide_banner", "-v", "error", "-i"])
            .arg(path)
            .arg("-t")
            .arg(format!("{:.3}", max_seconds))
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-f", "f32le", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(BeatCutError::AudioUnreadable {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let samples = pcm_from_le_bytes(&output.stdout);
        if samples.is_empty() {
            return Err(BeatCutError::AudioUnreadable {
                message: format!("{} has no audio samples", path.display()),
            });
        }
        Ok(samples)
    }

    async fn motion_score(&self, path: &Path) -> BeatCutResult<f64> {
        let output = Command::new(&self.ffmpeg)
            .args(["-nostdin", "-hide_banner", "-v", "error", "-t", "1", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(format!(
                "fps={},scale={}:{},format=gray",
                MOTION_FPS, MOTION_WIDTH, MOTION_HEIGHT
            ))
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "gray", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                "Motion analysis failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(0.0);
        }
        Ok(motion_from_gray_frames(&output.stdout, MOTION_WIDTH * MOTION_HEIGHT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_prefers_container() {
        let json = br#"{"format":{"duration":"12.5"},"streams":[{"codec_type":"video","width":1920,"height":1080,"duration":"12.4"}]}"#;
        assert_eq!(parse_probe_duration(json, true).unwrap(), 12.5);
    }

    #[test]
    fn test_duration_falls_back_to_streams() {
        let json = br#"{"format":{},"streams":[{"codec_type":"audio","duration":"3.0"},{"codec_type":"audio","duration":"4.0"}]}"#;
        assert_eq!(parse_probe_duration(json, false).unwrap(), 4.0);
    }

    #[test]
    fn test_video_without_dimensions_rejected() {
        let json = br#"{"format":{"duration":"5.0"},"streams":[{"codec_type":"video"}]}"#;
        assert!(parse_probe_duration(json, true).is_err());
    }

    #[test]
    fn test_garbage_output_rejected() {
        assert!(parse_probe_duration(b"not json", false).is_err());
    }

    #[test]
    fn test_pcm_from_le_bytes_drops_partial_sample() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        bytes.push(0);
        assert_eq!(pcm_from_le_bytes(&bytes), vec![0.5, -1.0]);
    }

    #[test]
    fn test_motion_from_gray_frames() {
        let still = [10u8; 8];
        assert_eq!(motion_from_gray_frames(&still, 4), 0.0);

        // Black, white, black: every pixel flips fully twice
        let mut flicker = vec![0u8; 4];
        flicker.extend([255u8; 4]);
        flicker.extend([0u8; 4]);
        assert!((motion_from_gray_frames(&flicker, 4) - 1.0).abs() < 1e-9);

        // One frame and a partial one carry no motion
        assert_eq!(motion_from_gray_frames(&[0, 0, 0, 0, 9, 9], 4), 0.0);
    }
}
