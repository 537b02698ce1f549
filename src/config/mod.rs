//! Job configuration
//!
//! A closed record of every recognized option, with defaults, validated once
//! at job start. Loading and precedence live in `config_initialization`.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{BeatCutError, BeatCutResult};
use crate::utils::Utils;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BeatCutConfig {
    pub output: OutputSettings,
    pub encoder: EncoderSettings,
    pub planner: PlannerSettings,
    pub analysis: AnalysisSettings,
    pub pool: PoolSettings,
    pub pipeline: PipelineSettings,
    pub captions: CaptionSettings,
}

/// Final and intermediate video format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate: String,
    pub maxrate: String,
    pub bufsize: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    /// Audio used when the job has no track
    pub synthetic_audio: SyntheticAudio,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_bitrate: "14M".to_string(),
            maxrate: "18M".to_string(),
            bufsize: "28M".to_string(),
            audio_bitrate: "192k".to_string(),
            audio_sample_rate: 48_000,
            synthetic_audio: SyntheticAudio::Silence,
        }
    }
}

impl OutputSettings {
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

/// Generated audio for jobs without a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SyntheticAudio {
    Silence,
    Tone { frequency: u32 },
}

/// Hardware acceleration options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareAcceleration {
    /// Detect from `ffmpeg -encoders`
    Auto,
    /// Software encoding (libx264)
    None,
    /// NVIDIA NVENC
    Nvenc,
    /// Intel Quick Sync Video
    Qsv,
    /// AMD Advanced Media Framework
    Amf,
    /// Apple VideoToolbox
    VideoToolbox,
}

impl HardwareAcceleration {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "none" | "cpu" | "software" => Some(Self::None),
            "nvenc" | "cuda" => Some(Self::Nvenc),
            "qsv" => Some(Self::Qsv),
            "amf" => Some(Self::Amf),
            "videotoolbox" => Some(Self::VideoToolbox),
            _ => None,
        }
    }
}

/// Pass 1 encoder options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderSettings {
    pub hardware: HardwareAcceleration,
    /// Preset for hardware encoders
    pub hardware_preset: String,
    /// Preset for libx264
    pub software_preset: String,
    pub crf: u8,
    /// Keyframe interval in frames
    pub gop: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            hardware: HardwareAcceleration::Auto,
            hardware_preset: "p1".to_string(),
            software_preset: "ultrafast".to_string(),
            crf: 18,
            gop: 60,
        }
    }
}

/// Relative weights of the three pulse widths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PulseWeights {
    /// Half-beat pulses
    pub half: f64,
    /// One-beat pulses
    pub one: f64,
    /// Two-beat pulses
    pub two: f64,
}

impl Default for PulseWeights {
    fn default() -> Self {
        Self {
            half: 0.25,
            one: 0.5,
            two: 0.25,
        }
    }
}

/// Edit planner options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerSettings {
    pub min_duration: f64,
    pub max_duration: f64,
    pub pulse_weights: PulseWeights,
    pub speed_min: f64,
    pub speed_max: f64,
    pub phrase_min_beats: u32,
    pub phrase_max_beats: u32,
    /// Shortest cut allowed, in seconds
    pub min_cut_duration: f64,
    pub min_clip_variety: usize,
    pub anti_repeat_window: usize,
    /// Quantize to whole beats and stitch a seamless loop
    pub seamless_loop: bool,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            min_duration: 5.0,
            max_duration: 20.0,
            pulse_weights: PulseWeights::default(),
            speed_min: 0.95,
            speed_max: 1.05,
            phrase_min_beats: 4,
            phrase_max_beats: 8,
            min_cut_duration: 0.18,
            min_clip_variety: 1,
            anti_repeat_window: 2,
            seamless_loop: true,
        }
    }
}

impl PlannerSettings {
    /// Requested duration, or a seeded draw from the configured range
    pub fn resolve_target<R: Rng>(&self, requested: Option<f64>, rng: &mut R) -> f64 {
        match requested {
            Some(duration) => duration,
            None if self.max_duration > self.min_duration => {
                rng.random_range(self.min_duration..=self.max_duration)
            }
            None => self.min_duration,
        }
    }
}

/// Beat analyzer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    pub sample_rate: u32,
    /// Only the first N seconds are analyzed
    pub max_seconds: f64,
    pub fft_size: usize,
    pub hop_size: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Centre of the tempo prior
    pub prior_bpm: f64,
    /// Frames this far below peak count as leading silence
    pub silence_db: f64,
    /// Tempo used for jobs without audio
    pub fallback_bpm: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            max_seconds: 120.0,
            fft_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            prior_bpm: 120.0,
            silence_db: 30.0,
            fallback_bpm: 120.0,
        }
    }
}

/// Clip pool options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    pub extensions: Vec<String>,
    /// Clips at or below this length are dropped
    pub min_clip_duration: f64,
    /// Clip identifiers never used
    pub exclusions: Vec<String>,
    /// File with one excluded identifier per line
    pub exclusion_file: Option<PathBuf>,
    /// Reuse measured durations and motion from the library's cache file
    pub cache: bool,
    /// Measure clip motion to favour busy footage for the loop clip and the drop
    pub motion_analysis: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            extensions: ["mp4", "mov", "mkv", "webm", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_clip_duration: 0.5,
            exclusions: Vec::new(),
            exclusion_file: None,
            cache: true,
            motion_analysis: true,
        }
    }
}

/// What happens when a segment fails to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Fail the job
    Abort,
    /// Replace the failing segment's clip and rerun Pass 1 once
    SubstituteOnce,
}

/// Render pipeline options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    /// Keep Pass 1 intermediates after the job
    pub keep_intermediates: bool,
    /// Root for job work directories, system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: Utils::default_worker_count(),
            failure_policy: FailurePolicy::Abort,
            keep_intermediates: false,
            work_dir: None,
        }
    }
}

/// Burned-in lyric captions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionSettings {
    pub enabled: bool,
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    /// Vertical anchor as a fraction of the frame height
    pub position: f64,
    pub max_chars_per_line: usize,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            font_file: None,
            font_size: 65,
            position: 0.8,
            max_chars_per_line: 25,
        }
    }
}

impl BeatCutConfig {
    /// Check every option once, before any work starts
    pub fn validate(&self) -> BeatCutResult<()> {
        let output = &self.output;
        if output.width == 0 || output.height == 0 || output.width % 2 != 0 || output.height % 2 != 0 {
            return Err(BeatCutError::config(format!(
                "resolution {}x{} must be positive and even",
                output.width, output.height
            )));
        }
        if output.fps == 0 || output.fps > 120 {
            return Err(BeatCutError::config(format!("fps {} outside 1..=120", output.fps)));
        }
        if output.audio_sample_rate == 0 {
            return Err(BeatCutError::config("audio sample rate must be positive"));
        }

        let planner = &self.planner;
        if planner.min_duration <= 0.0 || planner.max_duration < planner.min_duration {
            return Err(BeatCutError::config(format!(
                "duration range {}..{} is invalid",
                planner.min_duration, planner.max_duration
            )));
        }
        if !(planner.speed_min > 0.0 && planner.speed_min <= 1.0 && planner.speed_max >= 1.0) {
            return Err(BeatCutError::config(format!(
                "speed bounds {}..{} must bracket 1.0",
                planner.speed_min, planner.speed_max
            )));
        }
        let weights = &planner.pulse_weights;
        if [weights.half, weights.one, weights.two].iter().any(|w| *w < 0.0 || !w.is_finite())
            || weights.half + weights.one + weights.two <= 0.0
        {
            return Err(BeatCutError::config("pulse weights must be non-negative with a positive sum"));
        }
        if planner.phrase_min_beats == 0 || planner.phrase_max_beats < planner.phrase_min_beats {
            return Err(BeatCutError::config("phrase length range is invalid"));
        }
        if planner.min_cut_duration < 0.0 {
            return Err(BeatCutError::config("minimum cut duration must not be negative"));
        }
        if planner.min_clip_variety == 0 {
            return Err(BeatCutError::config("minimum clip variety must be at least 1"));
        }

        let analysis = &self.analysis;
        if analysis.sample_rate == 0 || analysis.hop_size == 0 || analysis.fft_size < analysis.hop_size {
            return Err(BeatCutError::config("analysis frame sizes are invalid"));
        }
        if analysis.min_bpm <= 0.0 || analysis.max_bpm <= analysis.min_bpm {
            return Err(BeatCutError::config("analysis BPM range is invalid"));
        }
        if analysis.fallback_bpm <= 0.0 || analysis.max_seconds <= 0.0 {
            return Err(BeatCutError::config("fallback BPM and analysis window must be positive"));
        }

        if self.pipeline.workers == 0 {
            return Err(BeatCutError::config("worker pool size must be at least 1"));
        }
        if self.pool.extensions.is_empty() {
            return Err(BeatCutError::config("at least one clip extension is required"));
        }
        if !(0.0..=1.0).contains(&self.captions.position) {
            return Err(BeatCutError::config("caption position must be within 0..=1"));
        }
        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> BeatCutResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BeatCutError::config(format!("cannot serialize configuration: {}", e)))
    }
}
