//! Clip selection with category rotation and anti-repetition

use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;
use tracing::{debug, warn};

use crate::domain::model::{Clip, Segment};
use crate::error::{BeatCutError, BeatCutResult};
use crate::pool::ClipPool;

/// How strictly a candidate honours the anti-repetition window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    /// Not used in the window and not reserved
    Fresh,
    /// Would not extend a run past the window
    RunSafe,
    /// Anything with footage
    Any,
}

/// Fraction of the sequence after which the edit "drops" into high-motion footage
pub const DROP_START: f64 = 0.55;

/// Bounds on how many of the busiest clips form the high-motion set
const HIGH_MOTION_MIN: usize = 6;
const HIGH_MOTION_MAX: usize = 24;

/// Motion preference for one position. A preference only narrows candidates
/// when some of them match; it never causes a pick to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionBias {
    Neutral,
    High,
    Low,
}

impl MotionBias {
    /// Calm footage before the drop, busy footage from it on
    pub fn for_position(position: usize, count: usize) -> Self {
        if position >= (DROP_START * count as f64) as usize {
            MotionBias::High
        } else {
            MotionBias::Low
        }
    }
}

/// A selection request for one position
#[derive(Debug, Clone, Copy)]
pub struct Pick<'r> {
    pub position: usize,
    /// Playback seconds the clip must supply
    pub needed: f64,
    /// Clips kept out of strict selection at this position
    pub reserved: &'r HashSet<String>,
    pub motion: MotionBias,
}

/// A chosen clip and the category it was drawn for
#[derive(Debug, Clone)]
pub struct Choice {
    pub clip: Clip,
    pub category: Option<String>,
    /// Anti-repetition had to give way
    pub relaxed: bool,
}

/// Stateful selector over one planning run
pub struct ClipSelector<'p> {
    pool: &'p ClipPool,
    categories: Vec<String>,
    window: usize,
    speed_min: f64,
    uses: HashMap<String, usize>,
    recent: VecDeque<String>,
    high_motion: HashSet<String>,
    low_motion: HashSet<String>,
}

impl<'p> ClipSelector<'p> {
    pub fn new(pool: &'p ClipPool, window: usize, speed_min: f64) -> Self {
        let (high_motion, low_motion) = motion_sets(pool.clips());
        Self {
            pool,
            categories: pool.categories().to_vec(),
            window,
            speed_min,
            uses: HashMap::new(),
            recent: VecDeque::new(),
            high_motion,
            low_motion,
        }
    }

    /// Pick a clip for `pick.position`, relaxing anti-repetition before giving up
    pub fn select<R: Rng>(&mut self, pick: Pick<'_>, rng: &mut R) -> BeatCutResult<Choice> {
        let category = if self.categories.is_empty() {
            None
        } else {
            Some(self.categories[pick.position % self.categories.len()].clone())
        };

        let in_category: Vec<&Clip> = match &category {
            Some(name) => self.pool.by_category(name),
            None => self.pool.clips().iter().collect(),
        };

        let found = self
            .choose(&in_category, pick, rng)
            .map(|(clip, tier)| (clip, tier, category.clone()))
            .or_else(|| {
                let everything: Vec<&Clip> = self.pool.clips().iter().collect();
                self.choose(&everything, pick, rng).map(|(clip, tier)| {
                    if let Some(name) = &category {
                        debug!("No clip in '{}' fits position {}, using any category", name, pick.position);
                    }
                    (clip, tier, None)
                })
            });

        let (clip, tier, category) = found.ok_or_else(|| BeatCutError::PlanningFailed {
            index: pick.position,
            message: format!("no clip can supply {:.3}s of footage", pick.needed),
        })?;

        if tier != Tier::Fresh {
            warn!(
                "Anti-repetition relaxed at segment {} (clip '{}')",
                pick.position, clip.id
            );
        }
        self.record(&clip.id);

        Ok(Choice {
            clip,
            category,
            relaxed: tier != Tier::Fresh,
        })
    }

    /// Mark a clip as used without drawing it
    pub fn record(&mut self, clip_id: &str) {
        *self.uses.entry(clip_id.to_string()).or_insert(0) += 1;
        self.recent.push_back(clip_id.to_string());
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }
    }

    fn choose<R: Rng>(
        &self,
        candidates: &[&Clip],
        pick: Pick<'_>,
        rng: &mut R,
    ) -> Option<(Clip, Tier)> {
        for tier in [Tier::Fresh, Tier::RunSafe, Tier::Any] {
            let allowed: Vec<&Clip> = candidates
                .iter()
                .copied()
                .filter(|clip| self.allowed(clip, tier, pick.reserved))
                .collect();

            // Full-speed footage first, slowed footage only when nothing else fits
            let full: Vec<&Clip> = allowed
                .iter()
                .copied()
                .filter(|clip| clip.duration + 1e-9 >= pick.needed)
                .collect();
            let pool = if full.is_empty() {
                allowed
                    .into_iter()
                    .filter(|clip| clip.can_supply(pick.needed, self.speed_min))
                    .collect()
            } else {
                full
            };
            let pool = self.prefer_motion(pool, pick.motion);

            if let Some(clip) = self.weighted(&pool, rng) {
                return Some((clip.clone(), tier));
            }
        }
        None
    }

    fn allowed(&self, clip: &Clip, tier: Tier, reserved: &HashSet<String>) -> bool {
        match tier {
            Tier::Fresh => !reserved.contains(&clip.id) && !self.recent.contains(&clip.id),
            Tier::RunSafe => {
                !reserved.contains(&clip.id)
                    && (self.window == 0
                        || self.recent.len() < self.window
                        || self.recent.iter().any(|id| id != &clip.id))
            }
            Tier::Any => true,
        }
    }

    fn prefer_motion<'c>(&self, clips: Vec<&'c Clip>, bias: MotionBias) -> Vec<&'c Clip> {
        let preferred = match bias {
            MotionBias::Neutral => return clips,
            MotionBias::High => &self.high_motion,
            MotionBias::Low => &self.low_motion,
        };
        let matching: Vec<&Clip> = clips
            .iter()
            .copied()
            .filter(|clip| preferred.contains(&clip.id))
            .collect();
        if matching.is_empty() {
            clips
        } else {
            matching
        }
    }

    /// Weight 1 / (1 + uses) so unused clips are favoured
    fn weighted<'c, R: Rng>(&self, clips: &[&'c Clip], rng: &mut R) -> Option<&'c Clip> {
        if clips.is_empty() {
            return None;
        }
        let weights: Vec<f64> = clips
            .iter()
            .map(|clip| 1.0 / (1.0 + *self.uses.get(&clip.id).unwrap_or(&0) as f64))
            .collect();
        let total: f64 = weights.iter().sum();

        let mut target = rng.random::<f64>() * total;
        for (clip, weight) in clips.iter().zip(&weights) {
            if target < *weight {
                return Some(*clip);
            }
            target -= weight;
        }
        clips.last().copied()
    }
}

/// High-motion set (the busiest clips) and low-motion set (all but the busiest third).
/// Both are empty when the pool carries no motion spread to rank by.
fn motion_sets(clips: &[Clip]) -> (HashSet<String>, HashSet<String>) {
    let varied = clips
        .first()
        .is_some_and(|first| clips.iter().any(|clip| clip.motion != first.motion));
    if !varied {
        return (HashSet::new(), HashSet::new());
    }

    let mut ranked: Vec<&Clip> = clips.iter().collect();
    ranked.sort_by(|a, b| b.motion.total_cmp(&a.motion).then_with(|| a.id.cmp(&b.id)));
    let high_len = (ranked.len() / 3)
        .clamp(HIGH_MOTION_MIN, HIGH_MOTION_MAX)
        .min(ranked.len());
    let high = ranked[..high_len].iter().map(|clip| clip.id.clone()).collect();
    let low = ranked[ranked.len() / 3..].iter().map(|clip| clip.id.clone()).collect();
    (high, low)
}

/// Build a segment from `clip`, slowing playback only as far as needed
pub fn cut_segment<R: Rng>(
    index: usize,
    clip: &Clip,
    category: Option<String>,
    duration: f64,
    speed_min: f64,
    rng: &mut R,
) -> Segment {
    let speed = fit_speed(clip.duration, duration, speed_min);
    let span = duration * speed;
    let latest_in = (clip.duration - span).max(0.0);
    let source_in = if latest_in > 0.0 {
        rng.random_range(0.0..=latest_in)
    } else {
        0.0
    };
    Segment::from_clip(index, clip, category, source_in, duration, speed)
}

/// Speed at which `available` seconds of footage fill `needed` seconds, never above 1
pub fn fit_speed(available: f64, needed: f64, speed_min: f64) -> f64 {
    if needed <= 0.0 || available >= needed {
        1.0
    } else {
        (available / needed).clamp(speed_min, 1.0)
    }
}
