// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::BeatCutResult;

/// Port for media probing and audio decoding
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> BeatCutResult<f64>;

    /// Mono f32 PCM resampled to `sample_rate`, at most `max_seconds` long.
    /// Fails with `AudioUnreadable` when the file cannot be decoded.
    async fn decode_audio(
        &self,
        path: &Path,
        sample_rate: u32,
        max_seconds: f64,
    ) -> BeatCutResult<Vec<f32>>;

    /// Visual activity of a clip's opening second, 0..=1.
    /// Backends that cannot measure it report 0.
    async fn motion_score(&self, _path: &Path) -> BeatCutResult<f64> {
        Ok(0.0)
    }
}

/// One Pass 1 encode, fully resolved
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEncode {
    /// Plan position, reported on failure
    pub index: usize,
    pub source: PathBuf,
    /// Input seek (source in-point)
    pub seek: f64,
    /// Source interval length read from the input
    pub span: f64,
    /// Complete `-vf` filter graph
    pub video_filter: String,
    /// Exact number of frames to emit
    pub frame_count: u64,
    pub fps: u32,
    /// Encoder arguments (`-c:v ...` and friends)
    pub codec_args: Vec<String>,
    pub output: PathBuf,
}

/// Audio stream fed into Pass 2
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Cut from a track starting at `offset`
    Track { path: PathBuf, offset: f64 },
    /// lavfi source expression, e.g. `anullsrc=r=48000:cl=stereo`
    Synthetic { lavfi: String },
}

/// The Pass 2 concat + mux
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatMux {
    /// ffmpeg concat-demuxer list
    pub list_file: PathBuf,
    pub audio: AudioSource,
    /// Final duration in seconds
    pub duration: f64,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    pub output: PathBuf,
}

/// Port for encode/mux execution
#[async_trait]
pub trait ExecutePort: Send + Sync {
    /// Render one segment; failures are `Render { index, .. }`
    async fn encode_segment(&self, request: &SegmentEncode) -> BeatCutResult<()>;

    /// Concatenate intermediates by stream copy and mux audio; failures are `Assembly`
    async fn concat_and_mux(&self, request: &ConcatMux) -> BeatCutResult<()>;

    /// Names of the video encoders the toolchain offers
    async fn available_encoders(&self) -> BeatCutResult<Vec<String>>;
}
