//! Seamless loop stitching
//!
//! The last segment is rewritten to play the footage immediately before the
//! first segment's in-point, from the same clip at the same speed. Played back
//! to back, the final frame runs straight into frame 0.

use tracing::debug;

use crate::domain::model::{EditPlan, Segment, TIME_EPSILON};
use crate::error::{BeatCutError, BeatCutResult};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoopStitcher;

impl LoopStitcher {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite the first and last segments for a continuous wraparound.
    /// Plans that are not loop-eligible, or have fewer than two segments, pass through.
    pub fn make_seamless(&self, mut plan: EditPlan) -> BeatCutResult<EditPlan> {
        if !plan.loop_eligible || plan.segments.len() < 2 {
            return Ok(plan);
        }

        let last_index = plan.segments.len() - 1;
        let first = plan.segments[0].clone();
        let last_duration = plan.segments[last_index].duration;

        let first_span = first.span();
        let last_span = last_duration * first.speed;
        let needed = first_span + last_span;
        if first.clip_duration + TIME_EPSILON < needed {
            return Err(BeatCutError::LoopClipTooShort {
                clip_id: first.clip_id,
                needed,
                available: first.clip_duration,
            });
        }

        let (first_in, last_in) = if first.source_in + TIME_EPSILON >= last_span {
            (first.source_in, (first.source_in - last_span).max(0.0))
        } else {
            // Not enough footage before the in-point: slide the first segment later
            (last_span, 0.0)
        };

        if first_in != first.source_in {
            debug!(
                "Moving first segment in-point {:.3}s -> {:.3}s to make room for the loop tail",
                first.source_in, first_in
            );
            let head = &mut plan.segments[0];
            head.source_in = first_in;
            head.source_out = first_in + first_span;
        }

        plan.segments[last_index] = Segment {
            index: last_index,
            clip_id: first.clip_id.clone(),
            clip_path: first.clip_path.clone(),
            clip_duration: first.clip_duration,
            category: first.category.clone(),
            source_in: last_in,
            source_out: first_in,
            duration: last_duration,
            speed: first.speed,
        };

        Ok(plan)
    }

    /// Whether the last segment already ends where the first begins
    pub fn is_seamless(plan: &EditPlan) -> bool {
        match (plan.segments.first(), plan.segments.last()) {
            (Some(first), Some(last)) if plan.segments.len() >= 2 => {
                first.clip_id == last.clip_id
                    && (last.source_out - first.source_in).abs() < TIME_EPSILON
                    && (last.speed - first.speed).abs() < TIME_EPSILON
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Clip;

    fn plan(first_in: f64, clip_length: f64) -> EditPlan {
        let loop_clip = Clip::new("wave", "/lib/sea/wave.mp4", clip_length);
        let other = Clip::new("road", "/lib/city/road.mp4", 8.0);
        let segments = vec![
            Segment::from_clip(0, &loop_clip, None, first_in, 1.0, 1.0),
            Segment::from_clip(1, &other, None, 2.0, 1.0, 1.0),
            Segment::from_clip(2, &other, None, 4.0, 0.5, 1.0),
        ];
        EditPlan {
            segments,
            total_duration: 2.5,
            target_duration: 2.5,
            beat_period: 0.5,
            bpm: 120.0,
            loop_eligible: true,
            repetition_relaxed: false,
            seed: 1,
        }
    }

    #[test]
    fn tail_ends_at_first_in_point() {
        let stitched = LoopStitcher::new().make_seamless(plan(2.0, 10.0)).unwrap();
        let last = stitched.segments.last().unwrap();
        assert_eq!(last.clip_id, "wave");
        assert_eq!(last.source_in, 1.5);
        assert_eq!(last.source_out, 2.0);
        assert_eq!(last.duration, 0.5);
        assert!(LoopStitcher::is_seamless(&stitched));
    }

    #[test]
    fn first_segment_slides_when_in_point_too_early() {
        let stitched = LoopStitcher::new().make_seamless(plan(0.25, 10.0)).unwrap();
        let first = &stitched.segments[0];
        let last = stitched.segments.last().unwrap();
        assert_eq!(first.source_in, 0.5);
        assert_eq!(first.source_out, 1.5);
        assert_eq!(last.source_in, 0.0);
        assert_eq!(last.source_out, 0.5);
    }

    #[test]
    fn stitching_is_idempotent() {
        let stitcher = LoopStitcher::new();
        for first_in in [0.25, 2.0] {
            let once = stitcher.make_seamless(plan(first_in, 10.0)).unwrap();
            let twice = stitcher.make_seamless(once.clone()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn short_loop_clip_rejected() {
        let err = LoopStitcher::new().make_seamless(plan(0.0, 1.2)).unwrap_err();
        assert!(matches!(err, BeatCutError::LoopClipTooShort { .. }));
    }

    #[test]
    fn non_loop_plan_unchanged() {
        let mut input = plan(2.0, 10.0);
        input.loop_eligible = false;
        let output = LoopStitcher::new().make_seamless(input.clone()).unwrap();
        assert_eq!(input, output);
    }
}
