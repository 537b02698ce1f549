//! Edit planning: beat-quantized segment sequences over the clip pool

pub mod loop_stitcher;
pub mod rhythm;
pub mod selector;
pub mod substitute;

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::PlannerSettings;
use crate::domain::model::{Clip, EditPlan, Segment, Track};
use crate::domain::rules::{longest_repeat_run, PlanRules};
use crate::error::{BeatCutError, BeatCutResult};
use crate::pool::ClipPool;

pub use loop_stitcher::LoopStitcher;
use rhythm::RhythmGenerator;
use selector::{cut_segment, fit_speed, ClipSelector, MotionBias, Pick};

/// Rhythm engine turning a track and a clip pool into an [`EditPlan`]
#[derive(Debug, Clone)]
pub struct EditPlanner {
    settings: PlannerSettings,
    fps: u32,
}

impl EditPlanner {
    pub fn new(settings: PlannerSettings, fps: u32) -> Self {
        Self { settings, fps }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Bounds every plan from this planner must satisfy
    pub fn rules(&self) -> PlanRules {
        PlanRules::new(
            self.fps,
            self.settings.speed_min,
            self.settings.speed_max,
            self.settings.anti_repeat_window,
        )
    }

    /// Plan `target_duration` seconds of cuts. The same inputs and seed always give the same plan.
    pub fn plan(
        &self,
        track: &Track,
        pool: &ClipPool,
        target_duration: f64,
        seed: u64,
    ) -> BeatCutResult<EditPlan> {
        self.check_pool(pool)?;
        if !target_duration.is_finite() || target_duration <= 0.0 {
            return Err(BeatCutError::PlanningFailed {
                index: 0,
                message: format!("target duration {} must be positive", target_duration),
            });
        }

        let period = track.beat_period();
        let loop_eligible = self.settings.seamless_loop;
        let (total_beats, total_duration) = if loop_eligible {
            let beats = (target_duration / period).round().max(1.0);
            (beats, beats * period)
        } else {
            (target_duration / period, target_duration)
        };
        info!(
            "Planning {:.3}s ({:.2} beats at {:.2} BPM) from {} clips, seed {}",
            total_duration,
            total_beats,
            track.bpm,
            pool.len(),
            seed
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let pulses = RhythmGenerator::new(&self.settings, period).pulses(total_beats, &mut rng);
        let durations = pulse_durations(&pulses, period, total_duration);
        let count = durations.len();
        debug!("{} pulses: {:?}", count, pulses);

        let speed_min = self.settings.speed_min;
        let window = self.settings.anti_repeat_window;
        let mut selector = ClipSelector::new(pool, window, speed_min);
        let mut segments: Vec<Segment> = Vec::with_capacity(count);
        let mut relaxed = false;
        let stitch = loop_eligible && count >= 2;

        let mut loop_clip: Option<(Clip, Option<String>, f64)> = None;
        let mut reserved: HashSet<String> = HashSet::new();

        for (position, duration) in durations.iter().copied().enumerate() {
            if stitch && position == count - 1 {
                break;
            }

            if stitch && position == 0 {
                let (choice, speed) = self.pick_loop_clip(&mut selector, &durations, &mut rng)?;
                relaxed |= choice.relaxed;
                let span = duration * speed;
                let latest_in = (choice.clip.duration - span).max(0.0);
                let source_in = if latest_in > 0.0 {
                    rng.random_range(0.0..=latest_in)
                } else {
                    0.0
                };
                segments.push(Segment::from_clip(
                    0,
                    &choice.clip,
                    choice.category.clone(),
                    source_in,
                    duration,
                    speed,
                ));
                reserved.insert(choice.clip.id.clone());
                loop_clip = Some((choice.clip, choice.category, speed));
                continue;
            }

            // Keep the loop clip out of the stretch just before its reuse as the tail
            let guard_start = count.saturating_sub(1 + window.max(1));
            let no_reservation = HashSet::new();
            let reserved_here = if stitch && position >= guard_start {
                &reserved
            } else {
                &no_reservation
            };

            let choice = selector.select(
                Pick {
                    position,
                    needed: duration,
                    reserved: reserved_here,
                    motion: MotionBias::for_position(position, count),
                },
                &mut rng,
            )?;
            relaxed |= choice.relaxed;
            segments.push(cut_segment(
                position,
                &choice.clip,
                choice.category,
                duration,
                speed_min,
                &mut rng,
            ));
        }

        if let Some((clip, category, speed)) = loop_clip {
            let last = count - 1;
            let duration = durations[last];
            let span = (duration * speed).min(clip.duration);
            let source_in = (clip.duration - span).max(0.0);
            segments.push(Segment::from_clip(last, &clip, category, source_in, duration, speed));
        }

        if longest_repeat_run(&segments) > window.max(1) {
            relaxed = true;
        }
        if relaxed {
            warn!("Plan repeats clips within the anti-repetition window");
        }

        let plan = EditPlan {
            segments,
            total_duration,
            target_duration,
            beat_period: period,
            bpm: track.bpm,
            loop_eligible,
            repetition_relaxed: relaxed,
            seed,
        };
        info!("Planned {} segments, {:.3}s total", plan.len(), plan.total_duration);
        Ok(plan)
    }

    fn check_pool(&self, pool: &ClipPool) -> BeatCutResult<()> {
        if pool.is_empty() {
            return Err(BeatCutError::EmptyClipPool {
                message: "no usable clips after probing and exclusions".to_string(),
            });
        }
        if pool.len() < self.settings.min_clip_variety {
            return Err(BeatCutError::InsufficientClips {
                available: pool.len(),
                required: self.settings.min_clip_variety,
            });
        }
        Ok(())
    }

    /// Segment 0 of a loop plan: a busy clip holding footage for both the head and the tail
    fn pick_loop_clip(
        &self,
        selector: &mut ClipSelector<'_>,
        durations: &[f64],
        rng: &mut StdRng,
    ) -> BeatCutResult<(selector::Choice, f64)> {
        let none = HashSet::new();
        let head = durations[0];
        let both = head + durations[durations.len() - 1];

        match selector.select(
            Pick {
                position: 0,
                needed: both,
                reserved: &none,
                motion: MotionBias::High,
            },
            rng,
        ) {
            Ok(choice) => {
                let speed = fit_speed(choice.clip.duration, both, self.settings.speed_min);
                Ok((choice, speed))
            }
            Err(_) => {
                warn!(
                    "No clip holds {:.3}s for a seamless loop, stitching will likely fail",
                    both
                );
                let choice = selector.select(
                    Pick {
                        position: 0,
                        needed: head,
                        reserved: &none,
                        motion: MotionBias::High,
                    },
                    rng,
                )?;
                let speed = fit_speed(choice.clip.duration, head, self.settings.speed_min);
                Ok((choice, speed))
            }
        }
    }
}

/// Seconds per pulse; the last one absorbs rounding so the sum is exact
fn pulse_durations(pulses: &[f64], period: f64, total: f64) -> Vec<f64> {
    let mut durations: Vec<f64> = pulses.iter().map(|beats| beats * period).collect();
    if let Some(last) = durations.len().checked_sub(1) {
        let head: f64 = durations[..last].iter().sum();
        durations[last] = total - head;
    }
    durations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::{is_beat_multiple, validate_plan};

    fn pool_of(count: usize, length: f64) -> ClipPool {
        let clips = (0..count)
            .map(|i| Clip::new(format!("clip{}", i), format!("/lib/x/clip{}.mp4", i), length).with_category("x"))
            .collect();
        ClipPool::from_clips(clips, vec!["x".to_string()])
    }

    fn planner(seamless_loop: bool) -> EditPlanner {
        let settings = PlannerSettings {
            seamless_loop,
            ..PlannerSettings::default()
        };
        EditPlanner::new(settings, 30)
    }

    fn track(bpm: f64) -> Track {
        Track::synthetic(bpm, 60.0).unwrap()
    }

    #[test]
    fn durations_sum_to_target_within_a_frame() {
        let pool = pool_of(5, 10.0);
        for (bpm, target) in [(90.0, 7.3), (124.0, 12.0), (174.0, 15.5), (60.0, 5.0)] {
            let plan = planner(false).plan(&track(bpm), &pool, target, 3).unwrap();
            assert!((plan.segment_duration_sum() - target).abs() <= 1.0 / 30.0);
            assert_eq!(plan.total_duration, target);
            assert!(validate_plan(&plan, &planner(false).rules()).is_ok());
        }
    }

    #[test]
    fn loop_plan_quantizes_to_whole_beats() {
        let pool = pool_of(5, 10.0);
        let plan = planner(true).plan(&track(124.0), &pool, 12.0, 8).unwrap();
        assert!((plan.beat_period - 0.4839).abs() < 1e-4);
        assert!(is_beat_multiple(plan.total_duration, plan.beat_period));
        assert!((plan.beats() - 25.0).abs() < 1e-9);
        assert!((plan.total_duration - 12.097).abs() < 1e-3);
    }

    #[test]
    fn loop_plan_reuses_first_clip_at_the_end() {
        let pool = pool_of(4, 10.0);
        let plan = planner(true).plan(&track(120.0), &pool, 10.0, 21).unwrap();
        let stitched = LoopStitcher::new().make_seamless(plan).unwrap();
        assert!(LoopStitcher::is_seamless(&stitched));
        assert!(validate_plan(&stitched, &planner(true).rules()).is_ok());
    }

    #[test]
    fn three_clip_pool_never_runs_three() {
        let pool = pool_of(3, 10.0);
        for seamless in [false, true] {
            for seed in 0..20 {
                let plan = planner(seamless).plan(&track(124.0), &pool, 12.0, seed).unwrap();
                let plan = LoopStitcher::new().make_seamless(plan).unwrap();
                assert!(plan.len() >= 10);
                assert!(longest_repeat_run(&plan.segments) <= 2, "seed {}", seed);
            }
        }
    }

    #[test]
    fn loop_clip_and_drop_use_busy_footage() {
        let busy = (0..6).map(|i| {
            Clip::new(format!("busy{}", i), format!("/lib/x/busy{}.mp4", i), 10.0)
                .with_category("x")
                .with_motion(0.8 - i as f64 * 0.05)
        });
        let calm = (0..6).map(|i| {
            Clip::new(format!("calm{}", i), format!("/lib/x/calm{}.mp4", i), 10.0)
                .with_category("x")
                .with_motion(0.02)
        });
        let pool = ClipPool::from_clips(busy.chain(calm).collect(), vec!["x".to_string()]);

        for seed in 0..10 {
            let plan = planner(true).plan(&track(124.0), &pool, 12.0, seed).unwrap();
            let count = plan.len();
            let drop = (selector::DROP_START * count as f64) as usize;
            assert!(plan.segments[0].clip_id.starts_with("busy"), "seed {}", seed);
            for segment in &plan.segments[drop..] {
                assert!(segment.clip_id.starts_with("busy"), "seed {} segment {}", seed, segment.index);
            }
        }
    }

    #[test]
    fn single_clip_pool_flags_relaxation() {
        let pool = pool_of(1, 30.0);
        let plan = planner(false).plan(&track(124.0), &pool, 12.0, 5).unwrap();
        assert!(plan.len() >= 10);
        assert!(plan.repetition_relaxed);
        assert!(validate_plan(&plan, &planner(false).rules()).is_ok());
    }

    #[test]
    fn speeds_stay_within_bounds() {
        // Clips barely shorter than a two-beat pulse force slowed playback
        let pool = pool_of(3, 0.97);
        let plan = planner(false).plan(&track(120.0), &pool, 8.0, 13).unwrap();
        for segment in &plan.segments {
            assert!(segment.speed >= 0.95 - 1e-9 && segment.speed <= 1.0);
            assert!(segment.source_in >= 0.0 && segment.source_out <= segment.clip_duration + 1e-6);
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let pool = pool_of(6, 8.0);
        let a = planner(true).plan(&track(128.0), &pool, 14.0, 77).unwrap();
        let b = planner(true).plan(&track(128.0), &pool, 14.0, 77).unwrap();
        let c = planner(true).plan(&track(128.0), &pool, 14.0, 78).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_and_small_pools_rejected() {
        let empty = ClipPool::default();
        let err = planner(false).plan(&track(120.0), &empty, 10.0, 1).unwrap_err();
        assert!(matches!(err, BeatCutError::EmptyClipPool { .. }));

        let settings = PlannerSettings {
            min_clip_variety: 3,
            ..PlannerSettings::default()
        };
        let err = EditPlanner::new(settings, 30)
            .plan(&track(120.0), &pool_of(2, 10.0), 10.0, 1)
            .unwrap_err();
        assert!(matches!(err, BeatCutError::InsufficientClips { available: 2, required: 3 }));
    }

    #[test]
    fn pulse_durations_absorb_rounding() {
        let durations = pulse_durations(&[1.0, 0.5, 2.0], 0.4839, 1.7);
        assert!((durations.iter().sum::<f64>() - 1.7).abs() < 1e-12);
        assert!((durations[0] - 0.4839).abs() < 1e-12);
    }
}
