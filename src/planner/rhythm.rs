//! Phrase and pulse generation
//!
//! Durations here are measured in beats. The planner converts them to
//! seconds once the whole sequence is known.

use rand::Rng;

use crate::config::{PlannerSettings, PulseWeights};

/// Beats below this are treated as zero
const BEAT_EPSILON: f64 = 1e-9;

/// Per-phrase feel, biasing the pulse-width draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    /// Mostly one-beat cuts
    Steady,
    /// Bursts of half-beat cuts
    Fast,
    /// Lingering two-beat cuts
    Slow,
    /// Configured weights unchanged
    Mixed,
}

impl Intensity {
    const ALL: [Intensity; 4] = [
        Intensity::Steady,
        Intensity::Fast,
        Intensity::Slow,
        Intensity::Mixed,
    ];

    fn bias(self, weights: &PulseWeights) -> [(f64, f64); 3] {
        let (half, one, two) = match self {
            Intensity::Steady => (1.0, 3.0, 1.0),
            Intensity::Fast => (3.0, 1.0, 1.0),
            Intensity::Slow => (1.0, 1.0, 3.0),
            Intensity::Mixed => (1.0, 1.0, 1.0),
        };
        [
            (0.5, weights.half * half),
            (1.0, weights.one * one),
            (2.0, weights.two * two),
        ]
    }
}

/// One phrase worth of pulses
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    pub intensity: Intensity,
    /// Pulse widths in beats, summing to the phrase length
    pub pulses: Vec<f64>,
}

impl Phrase {
    pub fn beats(&self) -> f64 {
        self.pulses.iter().sum()
    }
}

/// Draws phrases and pulses from the seeded generator
#[derive(Debug, Clone)]
pub struct RhythmGenerator {
    weights: PulseWeights,
    phrase_min_beats: u32,
    phrase_max_beats: u32,
    /// Shortest allowed cut, in beats
    min_cut_beats: f64,
}

impl RhythmGenerator {
    pub fn new(settings: &PlannerSettings, beat_period: f64) -> Self {
        let min_cut_beats = if beat_period > 0.0 {
            settings.min_cut_duration / beat_period
        } else {
            0.0
        };
        Self {
            weights: settings.pulse_weights.clone(),
            phrase_min_beats: settings.phrase_min_beats.max(1),
            phrase_max_beats: settings.phrase_max_beats.max(settings.phrase_min_beats.max(1)),
            min_cut_beats,
        }
    }

    /// Phrases covering exactly `total_beats`
    pub fn phrases<R: Rng>(&self, total_beats: f64, rng: &mut R) -> Vec<Phrase> {
        let mut phrases: Vec<Phrase> = Vec::new();
        let mut remaining = total_beats;

        while remaining > BEAT_EPSILON {
            let drawn = rng.random_range(self.phrase_min_beats..=self.phrase_max_beats) as f64;
            let length = drawn.min(remaining);

            if length < self.min_cut_beats {
                if let Some(pulse) = phrases.last_mut().and_then(|p| p.pulses.last_mut()) {
                    *pulse += length;
                    break;
                }
            }

            let intensity = Intensity::ALL[rng.random_range(0..Intensity::ALL.len())];
            let pulses = self.fill_phrase(length, intensity, rng);
            phrases.push(Phrase { intensity, pulses });
            remaining -= length;
        }

        phrases
    }

    /// Flattened pulse sequence covering exactly `total_beats`
    pub fn pulses<R: Rng>(&self, total_beats: f64, rng: &mut R) -> Vec<f64> {
        self.phrases(total_beats, rng)
            .into_iter()
            .flat_map(|phrase| phrase.pulses)
            .collect()
    }

    fn fill_phrase<R: Rng>(&self, length: f64, intensity: Intensity, rng: &mut R) -> Vec<f64> {
        let choices = intensity.bias(&self.weights);
        let mut pulses = Vec::new();
        let mut left = length;

        while left > BEAT_EPSILON {
            let mut pulse = draw_weighted(&choices, rng);
            if pulse < self.min_cut_beats {
                pulse = 1.0;
            }

            // Final pulse is truncated; a sliver too short to cut is absorbed instead
            if pulse >= left || left - pulse < self.min_cut_beats {
                pulses.push(left);
                break;
            }
            pulses.push(pulse);
            left -= pulse;
        }

        pulses
    }
}

fn draw_weighted<R: Rng>(choices: &[(f64, f64)], rng: &mut R) -> f64 {
    let total: f64 = choices.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= 0.0 {
        return 1.0;
    }

    let mut target = rng.random::<f64>() * total;
    for (value, weight) in choices {
        let weight = weight.max(0.0);
        if target < weight {
            return *value;
        }
        target -= weight;
    }
    choices.last().map(|(value, _)| *value).unwrap_or(1.0)
}
