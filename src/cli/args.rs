//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

use crate::app::RenderRequest;
use crate::config::{FailurePolicy, HardwareAcceleration};
use crate::config_initialization::ConfigOverrides;
use crate::utils::time::TimeParser;

fn parse_workers(value: &str) -> Result<usize, String> {
    number_range(value, 1, 64)
}

fn parse_fps(value: &str) -> Result<u32, String> {
    number_range(value, 1, 120)
}

fn parse_seconds(value: &str) -> Result<f64, String> {
    TimeParser::new().parse_time(value).map_err(|e| e.to_string())
}

fn parse_hardware(value: &str) -> Result<HardwareAcceleration, String> {
    HardwareAcceleration::parse(value).ok_or_else(|| {
        format!(
            "unknown acceleration '{}' (auto, none, nvenc, qsv, amf, videotoolbox)",
            value
        )
    })
}

/// Inputs shared by `render` and `plan`
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Music track; without one a synthetic beat grid and generated audio are used
    #[arg(short, long)]
    pub audio: Option<PathBuf>,

    /// Clip library root, one subdirectory per category
    #[arg(short, long)]
    pub library: PathBuf,

    /// Category to draw from (repeatable); all subdirectories when omitted
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Target duration (seconds or MM:SS.ms); drawn from the configured range when omitted
    #[arg(short, long, value_parser = parse_seconds)]
    pub duration: Option<f64>,

    /// Planning seed; derived from the inputs when omitted
    #[arg(long, env = "BEATCUT_SEED")]
    pub seed: Option<u64>,

    /// Timed lyrics (LRC) to burn in as captions
    #[arg(long)]
    pub lyrics: Option<PathBuf>,

    /// Track time the lyric window starts at; snapped down to a beat
    #[arg(long, value_parser = parse_seconds, requires = "lyrics")]
    pub lyric_start: Option<f64>,

    /// Clip identifier to skip (repeatable)
    #[arg(long = "exclude")]
    pub exclusions: Vec<String>,

    /// File with one excluded clip identifier per line
    #[arg(long)]
    pub exclude_file: Option<PathBuf>,

    /// Pass 1 worker count
    #[arg(short, long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Do not quantize to whole beats or stitch a seamless loop
    #[arg(long)]
    pub no_loop: bool,

    /// Hardware acceleration for intermediates
    #[arg(long, value_parser = parse_hardware)]
    pub hwaccel: Option<HardwareAcceleration>,

    /// Encoder preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Output frame rate
    #[arg(long, value_parser = parse_fps)]
    pub fps: Option<u32>,

    /// Replace a failing segment's clip and rerun Pass 1 once
    #[arg(long)]
    pub substitute_on_failure: bool,

    /// Keep Pass 1 intermediates after the job
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Root directory for job work directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

impl JobArgs {
    /// Configuration values set on the command line
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workers: self.workers,
            hardware: self.hwaccel,
            preset: self.preset.clone(),
            fps: self.fps,
            seamless_loop: if self.no_loop { Some(false) } else { None },
            keep_intermediates: if self.keep_intermediates { Some(true) } else { None },
            failure_policy: if self.substitute_on_failure {
                Some(FailurePolicy::SubstituteOnce)
            } else {
                None
            },
            exclusions: self.exclusions.clone(),
            exclusion_file: self.exclude_file.clone(),
            work_dir: self.work_dir.clone(),
        }
    }

    pub fn request(&self, output: PathBuf, manifest: Option<PathBuf>) -> RenderRequest {
        RenderRequest {
            audio: self.audio.clone(),
            library: self.library.clone(),
            categories: self.categories.clone(),
            output,
            duration: self.duration,
            seed: self.seed,
            lyrics: self.lyrics.clone(),
            lyric_start: self.lyric_start,
            manifest,
        }
    }
}

/// Arguments for the render command
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Output video path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Manifest path (default: next to the output as NAME.manifest.json)
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Also write the manifest to this file
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Track to analyze
    #[arg(short, long)]
    pub audio: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Print every beat timestamp
    #[arg(long)]
    pub beats: bool,
}

/// Arguments for the assemble command
#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Manifest written by a previous render
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Directory holding the kept seg_NNNN.mp4 intermediates
    #[arg(short, long)]
    pub segments: PathBuf,

    /// Output video path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Track to mux; generated audio when omitted
    #[arg(short, long)]
    pub audio: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the configuration to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
