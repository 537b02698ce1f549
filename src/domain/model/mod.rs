// Domain models - Core types and data structures

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BeatCutError, BeatCutResult};

/// Tolerance used for comparisons between derived timestamps
pub const TIME_EPSILON: f64 = 1e-6;

/// Analyzed audio source. Immutable once built by the beat analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Identifier derived from the file name ("synthetic" for generated audio)
    pub id: String,
    /// Source file, absent when audio is synthesized
    pub path: Option<PathBuf>,
    /// Total duration in seconds
    pub duration: f64,
    /// Detected tempo
    pub bpm: f64,
    /// Beat timestamps, strictly increasing, first element >= 0
    pub beat_grid: Vec<f64>,
    /// Recommended playback start, always a member of the beat grid
    pub start_offset: f64,
}

impl Track {
    /// Build a track by walking a fixed-period grid from `first_beat` over `duration`
    pub fn from_grid(
        id: impl Into<String>,
        path: Option<PathBuf>,
        duration: f64,
        bpm: f64,
        first_beat: f64,
    ) -> BeatCutResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(BeatCutError::NoBeatDetected {
                message: format!("tempo estimate {} is not positive", bpm),
            });
        }
        let period = 60.0 / bpm;
        let mut beat_grid = Vec::new();
        let mut index = 0u64;
        loop {
            let beat = first_beat.max(0.0) + index as f64 * period;
            if beat >= duration && !beat_grid.is_empty() {
                break;
            }
            beat_grid.push(beat);
            index += 1;
        }
        let start_offset = beat_grid[0];
        Ok(Self {
            id: id.into(),
            path,
            duration,
            bpm,
            beat_grid,
            start_offset,
        })
    }

    /// Generated track used when a job has no audio file
    pub fn synthetic(bpm: f64, duration: f64) -> BeatCutResult<Self> {
        Self::from_grid("synthetic", None, duration, bpm, 0.0)
    }

    /// Beat period in seconds
    pub fn beat_period(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Set the recommended start to the first beat at or after `time`
    pub fn with_start_at_or_after(mut self, time: f64) -> Self {
        if let Some(beat) = self
            .beat_grid
            .iter()
            .copied()
            .find(|beat| *beat + TIME_EPSILON >= time)
        {
            self.start_offset = beat;
        }
        self
    }

    /// Greatest beat that is <= `time`; `None` when `time` precedes the grid
    pub fn beat_at_or_before(&self, time: f64) -> Option<f64> {
        let position = self
            .beat_grid
            .partition_point(|beat| *beat <= time + TIME_EPSILON);
        position.checked_sub(1).map(|last| self.beat_grid[last])
    }

    /// First grid beat
    pub fn first_beat(&self) -> f64 {
        self.beat_grid.first().copied().unwrap_or(self.start_offset)
    }
}

/// A b-roll source in the clip pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Identifier derived from the file stem
    pub id: String,
    pub path: PathBuf,
    /// Total duration in seconds
    pub duration: f64,
    /// Category tags, in discovery order
    pub categories: Vec<String>,
    /// Mean inter-frame difference over the opening second, 0..=1; 0 when unmeasured
    #[serde(default)]
    pub motion: f64,
}

impl Clip {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            duration,
            categories: Vec::new(),
            motion: 0.0,
        }
    }

    pub fn with_motion(mut self, motion: f64) -> Self {
        self.motion = motion.clamp(0.0, 1.0);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Whether the clip can supply `duration` seconds of output at a speed no lower than `min_speed`
    pub fn can_supply(&self, duration: f64, min_speed: f64) -> bool {
        self.duration + TIME_EPSILON >= duration * min_speed
    }
}

/// One planned cut
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the final sequence
    pub index: usize,
    pub clip_id: String,
    pub clip_path: PathBuf,
    /// Duration of the whole source clip
    pub clip_duration: f64,
    /// Category the clip was drawn for, if any
    pub category: Option<String>,
    /// In-point in source-clip time
    pub source_in: f64,
    /// Out-point in source-clip time
    pub source_out: f64,
    /// Playback duration after speed adjustment
    pub duration: f64,
    /// Speed multiplier, `(source_out - source_in) / speed == duration`
    pub speed: f64,
}

impl Segment {
    /// Build a segment from a clip, in-point, target duration and speed
    pub fn from_clip(
        index: usize,
        clip: &Clip,
        category: Option<String>,
        source_in: f64,
        duration: f64,
        speed: f64,
    ) -> Self {
        Self {
            index,
            clip_id: clip.id.clone(),
            clip_path: clip.path.clone(),
            clip_duration: clip.duration,
            category,
            source_in,
            source_out: source_in + duration * speed,
            duration,
            speed,
        }
    }

    /// Length of the source interval consumed
    pub fn span(&self) -> f64 {
        self.source_out - self.source_in
    }
}

/// Ordered sequence of segments plus aggregate metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    pub segments: Vec<Segment>,
    /// Sum of segment durations
    pub total_duration: f64,
    /// Duration originally requested
    pub target_duration: f64,
    pub beat_period: f64,
    pub bpm: f64,
    /// Total duration is a whole number of beats and the plan may be stitched
    pub loop_eligible: bool,
    /// Anti-repetition had to be relaxed for at least one selection
    pub repetition_relaxed: bool,
    /// Seed the plan was generated from
    pub seed: u64,
}

impl EditPlan {
    /// Total length expressed in beats
    pub fn beats(&self) -> f64 {
        self.total_duration / self.beat_period
    }

    /// Timeline start of every segment
    pub fn segment_starts(&self) -> Vec<f64> {
        let mut cursor = 0.0;
        self.segments
            .iter()
            .map(|segment| {
                let start = cursor;
                cursor += segment.duration;
                start
            })
            .collect()
    }

    pub fn segment_duration_sum(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Timing of a single word inside a lyric line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub start: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    pub text: String,
}

/// One timed lyric line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
}

impl LyricLine {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// Copy of the line moved by `delta` seconds
    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
            text: self.text.clone(),
            words: self
                .words
                .iter()
                .map(|w| WordTiming {
                    start: w.start + delta,
                    end: w.end.map(|e| e + delta),
                    text: w.text.clone(),
                })
                .collect(),
        }
    }
}

/// Lifecycle of a render job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Planned,
    Rendering,
    Assembling,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Planned => "planned",
            JobState::Rendering => "rendering",
            JobState::Assembling => "assembling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Mutable working state of one render invocation
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: String,
    pub track: Track,
    pub plan: EditPlan,
    /// Lyric timeline relative to the start of the video
    pub lyrics: Vec<LyricLine>,
    /// Where the audio is cut from the track
    pub audio_offset: f64,
    /// Directory holding the Pass 1 intermediates
    pub work_dir: PathBuf,
    /// Segment index to intermediate file, filled as Pass 1 completes
    pub segment_outputs: BTreeMap<usize, PathBuf>,
    pub output_path: PathBuf,
    pub state: JobState,
}

impl RenderJob {
    pub fn new(
        id: impl Into<String>,
        track: Track,
        plan: EditPlan,
        work_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        let audio_offset = track.start_offset;
        Self {
            id: id.into(),
            track,
            plan,
            lyrics: Vec::new(),
            audio_offset,
            work_dir: work_dir.into(),
            segment_outputs: BTreeMap::new(),
            output_path: output_path.into(),
            state: JobState::Planned,
        }
    }

    pub fn with_lyrics(mut self, audio_offset: f64, lyrics: Vec<LyricLine>) -> Self {
        self.audio_offset = audio_offset;
        self.lyrics = lyrics;
        self
    }

    /// Intermediate file name for a segment
    pub fn segment_path(&self, index: usize) -> PathBuf {
        segment_file_path(&self.work_dir, index)
    }

    pub fn record_segment(&mut self, index: usize, path: PathBuf) {
        self.segment_outputs.insert(index, path);
    }

    pub fn is_complete(&self) -> bool {
        (0..self.plan.len()).all(|i| self.segment_outputs.contains_key(&i))
    }

    /// Intermediates in plan order, failing on the first missing index
    pub fn ordered_outputs(&self) -> BeatCutResult<Vec<PathBuf>> {
        (0..self.plan.len())
            .map(|index| {
                self.segment_outputs.get(&index).cloned().ok_or_else(|| {
                    BeatCutError::assembly(format!("missing intermediate for segment {}", index))
                })
            })
            .collect()
    }
}

/// Published result of a successful job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalArtifact {
    pub video_path: PathBuf,
    pub manifest_path: PathBuf,
    /// Container duration as probed after assembly
    pub duration: f64,
}

/// Canonical intermediate path for segment `index` inside `dir`
pub fn segment_file_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("seg_{:04}.mp4", index))
}

#[cfg(test)]
mod tests;
