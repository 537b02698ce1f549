//! Segment substitution after a render failure

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::selector::{cut_segment, fit_speed, ClipSelector, MotionBias, Pick};
use super::{EditPlanner, LoopStitcher};
use crate::domain::model::{EditPlan, Segment};
use crate::domain::rules::longest_repeat_run;
use crate::error::{BeatCutError, BeatCutResult};
use crate::pool::ClipPool;

impl EditPlanner {
    /// Copy of `plan` with segment `index` redrawn from clips outside `banned`.
    /// For a stitched loop, replacing the head or the tail replaces both.
    pub fn substitute(
        &self,
        plan: &EditPlan,
        pool: &ClipPool,
        index: usize,
        banned: &HashSet<String>,
    ) -> BeatCutResult<EditPlan> {
        let count = plan.segments.len();
        if index >= count {
            return Err(BeatCutError::PlanningFailed {
                index,
                message: format!("plan has only {} segments", count),
            });
        }

        let available = pool.without(banned);
        if available.is_empty() {
            return Err(BeatCutError::PlanningFailed {
                index,
                message: "no substitute clip left in the pool".to_string(),
            });
        }

        let window = self.settings.anti_repeat_window;
        let speed_min = self.settings.speed_min;
        let mut rng = StdRng::seed_from_u64(plan.seed ^ ((index as u64 + 1) << 32));
        let mut selector = ClipSelector::new(&available, window, speed_min);
        for earlier in &plan.segments[index.saturating_sub(window)..index] {
            selector.record(&earlier.clip_id);
        }

        // Prefer a clip that differs from both neighbours
        let mut neighbours: HashSet<String> = HashSet::new();
        if index > 0 {
            neighbours.insert(plan.segments[index - 1].clip_id.clone());
        }
        if index + 1 < count {
            neighbours.insert(plan.segments[index + 1].clip_id.clone());
        }

        let mut next = plan.clone();
        let loop_pair = plan.loop_eligible && count >= 2 && (index == 0 || index == count - 1);

        let relaxed = if loop_pair {
            let head = plan.segments[0].duration;
            let tail = plan.segments[count - 1].duration;
            neighbours.insert(plan.segments[1].clip_id.clone());
            if count > 2 {
                neighbours.insert(plan.segments[count - 2].clip_id.clone());
            }

            let choice = selector.select(
                Pick {
                    position: 0,
                    needed: head + tail,
                    reserved: &neighbours,
                    motion: MotionBias::High,
                },
                &mut rng,
            )?;
            let speed = fit_speed(choice.clip.duration, head + tail, speed_min);
            next.segments[0] = Segment::from_clip(0, &choice.clip, choice.category.clone(), 0.0, head, speed);
            next.segments[count - 1] =
                Segment::from_clip(count - 1, &choice.clip, choice.category, 0.0, tail, speed);
            next = LoopStitcher::new().make_seamless(next)?;
            choice.relaxed
        } else {
            let duration = plan.segments[index].duration;
            let choice = selector.select(
                Pick {
                    position: index,
                    needed: duration,
                    reserved: &neighbours,
                    motion: MotionBias::for_position(index, count),
                },
                &mut rng,
            )?;
            next.segments[index] =
                cut_segment(index, &choice.clip, choice.category, duration, speed_min, &mut rng);
            choice.relaxed
        };

        next.repetition_relaxed = plan.repetition_relaxed
            || relaxed
            || longest_repeat_run(&next.segments) > window.max(1);

        info!(
            "Segment {} now uses clip '{}'",
            index, next.segments[index].clip_id
        );
        Ok(next)
    }
}
