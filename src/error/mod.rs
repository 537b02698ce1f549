//! Error handling module for BeatCut

use thiserror::Error;

/// Main error type for BeatCut operations
#[derive(Error, Debug)]
pub enum BeatCutError {
    /// Audio file cannot be decoded
    #[error("Audio unreadable: {message}")]
    AudioUnreadable { message: String },

    /// Media file could not be probed
    #[error("Failed to probe {path}: {message}")]
    ProbeFailed { path: String, message: String },

    /// Tempo estimation produced no usable BPM
    #[error("No beat detected: {message}")]
    NoBeatDetected { message: String },

    /// No clips were found in the library
    #[error("Clip pool is empty: {message}")]
    EmptyClipPool { message: String },

    /// Pool is smaller than the configured variety threshold
    #[error("Insufficient clips: {available} available, {required} required")]
    InsufficientClips { available: usize, required: usize },

    /// No valid pulse/clip combination under the constraints
    #[error("Planning failed at segment {index}: {message}")]
    PlanningFailed { index: usize, message: String },

    /// Loop clip cannot supply first and last spans without overlap
    #[error("Loop clip '{clip_id}' too short: needs {needed:.3}s, has {available:.3}s")]
    LoopClipTooShort {
        clip_id: String,
        needed: f64,
        available: f64,
    },

    /// Lyric window contains no lines
    #[error("No lyrics in window [{start:.3}s, {end:.3}s)")]
    NoLyricsInWindow { start: f64, end: f64 },

    /// Requested lyric start lies before the first beat of the grid
    #[error("Lyric start {requested:.3}s is before the first beat at {first_beat:.3}s")]
    LyricStartBeforeGrid { requested: f64, first_beat: f64 },

    /// Lyric file could not be parsed
    #[error("Invalid lyrics at line {line}: {message}")]
    InvalidLyrics { line: usize, message: String },

    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.ms, MM:SS.ms, or seconds")]
    InvalidTime { time: String },

    /// Pass 1 failure for a single segment
    #[error("Render failed for segment {index}: {message}")]
    Render { index: usize, message: String },

    /// Pass 2 failure
    #[error("Assembly failed: {message}")]
    Assembly { message: String },

    /// Configuration validation error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// ffmpeg/ffprobe binary not found
    #[error("{tool} not found in PATH")]
    FfmpegNotFound { tool: String },

    /// Work stopped after another worker failed
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error category reported to the user when a job fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Planning,
    Render,
    Assembly,
    Config,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Input => "input",
            ErrorKind::Planning => "planning",
            ErrorKind::Render => "render",
            ErrorKind::Assembly => "assembly",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", name)
    }
}

impl BeatCutError {
    /// Classify the error for job reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            BeatCutError::AudioUnreadable { .. }
            | BeatCutError::ProbeFailed { .. }
            | BeatCutError::NoBeatDetected { .. }
            | BeatCutError::EmptyClipPool { .. }
            | BeatCutError::InsufficientClips { .. }
            | BeatCutError::NoLyricsInWindow { .. }
            | BeatCutError::LyricStartBeforeGrid { .. }
            | BeatCutError::InvalidLyrics { .. }
            | BeatCutError::InvalidTime { .. } => ErrorKind::Input,
            BeatCutError::PlanningFailed { .. } | BeatCutError::LoopClipTooShort { .. } => {
                ErrorKind::Planning
            }
            BeatCutError::Render { .. } | BeatCutError::Cancelled => ErrorKind::Render,
            BeatCutError::Assembly { .. } => ErrorKind::Assembly,
            BeatCutError::Config { .. } | BeatCutError::FfmpegNotFound { .. } => ErrorKind::Config,
            BeatCutError::Io(_) | BeatCutError::Json(_) => ErrorKind::Io,
        }
    }

    /// Plan position the failure is attributed to, if any
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            BeatCutError::Render { index, .. } | BeatCutError::PlanningFailed { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        BeatCutError::Config {
            message: message.into(),
        }
    }

    pub fn assembly(message: impl Into<String>) -> Self {
        BeatCutError::Assembly {
            message: message.into(),
        }
    }

    pub fn render(index: usize, message: impl Into<String>) -> Self {
        BeatCutError::Render {
            index,
            message: message.into(),
        }
    }
}

/// Result type alias for BeatCut operations
pub type BeatCutResult<T> = std::result::Result<T, BeatCutError>;
