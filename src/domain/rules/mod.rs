// Domain rules - Plan invariants checked before any rendering work is spent

use crate::domain::model::*;
use crate::error::{BeatCutError, BeatCutResult};

/// Bounds a plan must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRules {
    /// One output frame, the tolerance for duration sums
    pub frame_interval: f64,
    pub speed_min: f64,
    pub speed_max: f64,
    /// Anti-repetition window size
    pub repeat_window: usize,
}

impl PlanRules {
    pub fn new(fps: u32, speed_min: f64, speed_max: f64, repeat_window: usize) -> Self {
        Self {
            frame_interval: 1.0 / fps.max(1) as f64,
            speed_min,
            speed_max,
            repeat_window,
        }
    }
}

/// Whether `total` is a whole number of `period`s within floating-point tolerance
pub fn is_beat_multiple(total: f64, period: f64) -> bool {
    if period <= 0.0 {
        return false;
    }
    let beats = total / period;
    (beats - beats.round()).abs() < 1e-6
}

/// Longest run of consecutive segments that share one clip
pub fn longest_repeat_run(segments: &[Segment]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<&str> = None;
    for segment in segments {
        if previous == Some(segment.clip_id.as_str()) {
            current += 1;
        } else {
            current = 1;
        }
        longest = longest.max(current);
        previous = Some(segment.clip_id.as_str());
    }
    longest
}

/// Check every plan invariant, failing on the first violation
pub fn validate_plan(plan: &EditPlan, rules: &PlanRules) -> BeatCutResult<()> {
    if plan.segments.is_empty() {
        return Err(BeatCutError::PlanningFailed {
            index: 0,
            message: "plan has no segments".to_string(),
        });
    }

    for (position, segment) in plan.segments.iter().enumerate() {
        validate_segment(position, segment, rules)?;
    }

    let sum = plan.segment_duration_sum();
    if (sum - plan.total_duration).abs() > rules.frame_interval {
        return Err(BeatCutError::PlanningFailed {
            index: plan.segments.len() - 1,
            message: format!(
                "segment durations sum to {:.4}s, plan total is {:.4}s",
                sum, plan.total_duration
            ),
        });
    }

    if plan.loop_eligible && !is_beat_multiple(plan.total_duration, plan.beat_period) {
        return Err(BeatCutError::PlanningFailed {
            index: plan.segments.len() - 1,
            message: format!(
                "loop plan total {:.4}s is not a multiple of the beat period {:.4}s",
                plan.total_duration, plan.beat_period
            ),
        });
    }

    let run = longest_repeat_run(&plan.segments);
    if run > rules.repeat_window.max(1) && !plan.repetition_relaxed {
        return Err(BeatCutError::PlanningFailed {
            index: 0,
            message: format!(
                "a clip repeats {} times in a row without relaxation being flagged",
                run
            ),
        });
    }

    Ok(())
}

fn validate_segment(position: usize, segment: &Segment, rules: &PlanRules) -> BeatCutResult<()> {
    let fail = |message: String| BeatCutError::PlanningFailed {
        index: position,
        message,
    };

    if segment.index != position {
        return Err(fail(format!("segment carries index {}", segment.index)));
    }
    if segment.source_in < -TIME_EPSILON || segment.source_in >= segment.source_out {
        return Err(fail(format!(
            "in-point {:.4} is not before out-point {:.4}",
            segment.source_in, segment.source_out
        )));
    }
    if segment.source_out > segment.clip_duration + TIME_EPSILON {
        return Err(fail(format!(
            "out-point {:.4} exceeds clip duration {:.4}",
            segment.source_out, segment.clip_duration
        )));
    }
    if segment.speed < rules.speed_min - TIME_EPSILON || segment.speed > rules.speed_max + TIME_EPSILON
    {
        return Err(fail(format!(
            "speed {:.4} outside [{}, {}]",
            segment.speed, rules.speed_min, rules.speed_max
        )));
    }
    if (segment.span() / segment.speed - segment.duration).abs() > 1e-6 {
        return Err(fail("source span does not match duration at speed".to_string()));
    }
    Ok(())
}
