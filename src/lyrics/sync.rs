//! Lyric synchronization onto the beat grid

use tracing::{debug, info};

use crate::domain::model::{EditPlan, LyricLine, Track, TIME_EPSILON};
use crate::error::{BeatCutError, BeatCutResult};

/// Result of snapping a lyric window onto the grid
#[derive(Debug, Clone, PartialEq)]
pub struct LyricSync {
    /// Beat the window starts on, in track time
    pub snapped_start: f64,
    /// Shifted lines in track time, starting inside the window
    pub timeline: Vec<LyricLine>,
    /// Window length (the plan's total duration)
    pub window: f64,
}

impl LyricSync {
    /// Lines relative to the first video frame, clamped to the video length
    pub fn video_timeline(&self) -> Vec<LyricLine> {
        self.timeline
            .iter()
            .map(|line| {
                let mut relative = line.shifted(-self.snapped_start);
                relative.end = relative.end.min(self.window);
                for word in &mut relative.words {
                    word.end = word.end.map(|end| end.min(self.window));
                }
                relative
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LyricSynchronizer;

impl LyricSynchronizer {
    pub fn new() -> Self {
        Self
    }

    /// Snap `requested_start` down to a beat, move every line by the same amount,
    /// and keep the lines starting within `[snapped, snapped + plan.total_duration)`.
    /// A request before the first beat has no beat to snap down to and is rejected.
    pub fn sync(
        &self,
        plan: &EditPlan,
        track: &Track,
        lines: &[LyricLine],
        requested_start: f64,
    ) -> BeatCutResult<LyricSync> {
        let snapped_start = track.beat_at_or_before(requested_start).ok_or(
            BeatCutError::LyricStartBeforeGrid {
                requested: requested_start,
                first_beat: track.first_beat(),
            },
        )?;
        let delta = snapped_start - requested_start;
        let window_end = snapped_start + plan.total_duration;
        debug!(
            "Lyric start {:.3}s snapped to beat {:.3}s (shift {:+.3}s)",
            requested_start, snapped_start, delta
        );

        let timeline: Vec<LyricLine> = lines
            .iter()
            .map(|line| line.shifted(delta))
            .filter(|line| line.start + TIME_EPSILON >= snapped_start && line.start < window_end)
            .collect();

        if timeline.is_empty() {
            return Err(BeatCutError::NoLyricsInWindow {
                start: snapped_start,
                end: window_end,
            });
        }

        info!(
            "{} lyric lines in window {:.3}s..{:.3}s",
            timeline.len(),
            snapped_start,
            window_end
        );
        Ok(LyricSync {
            snapped_start,
            timeline,
            window: plan.total_duration,
        })
    }
}
