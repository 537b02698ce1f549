//! Tempo and beat-phase estimation over an onset envelope

use std::path::Path;

use super::onset::OnsetEnvelope;

/// Search range and prior for tempo estimation
#[derive(Debug, Clone, PartialEq)]
pub struct TempoSearch {
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Centre of the log-Gaussian tempo prior
    pub prior_bpm: f64,
    /// Prior width in octaves
    pub prior_width: f64,
}

impl TempoSearch {
    pub fn new(min_bpm: f64, max_bpm: f64, prior_bpm: f64) -> Self {
        Self {
            min_bpm,
            max_bpm,
            prior_bpm,
            prior_width: 1.0,
        }
    }

    fn weight(&self, bpm: f64) -> f64 {
        let octaves = (bpm / self.prior_bpm).log2() / self.prior_width;
        (-0.5 * octaves * octaves).exp()
    }
}

/// Beat period in (fractional) envelope frames, or `None` when the envelope has no periodicity
pub fn estimate_period_frames(envelope: &OnsetEnvelope, search: &TempoSearch) -> Option<f64> {
    let n = envelope.len();
    if n < 4 {
        return None;
    }

    let mean = envelope.values.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let centred: Vec<f64> = envelope.values.iter().map(|v| *v as f64 - mean).collect();
    let energy: f64 = centred.iter().map(|v| v * v).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    let min_lag = ((60.0 * envelope.frame_rate / search.max_bpm).ceil() as usize).max(1);
    let max_lag = ((60.0 * envelope.frame_rate / search.min_bpm).floor() as usize).min(n / 2);
    if min_lag > max_lag {
        return None;
    }

    let autocorr = |lag: usize| -> f64 {
        if lag == 0 || lag >= n {
            return 0.0;
        }
        let sum: f64 = centred[..n - lag]
            .iter()
            .zip(&centred[lag..])
            .map(|(a, b)| a * b)
            .sum();
        sum / (n - lag) as f64
    };

    let mut best: Option<(usize, f64)> = None;
    for lag in min_lag..=max_lag {
        let bpm = 60.0 * envelope.frame_rate / lag as f64;
        let score = autocorr(lag) * search.weight(bpm);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((lag, score));
        }
    }

    let (lag, score) = best?;
    if score <= 0.0 {
        return None;
    }

    let (left, centre, right) = (autocorr(lag - 1), autocorr(lag), autocorr(lag + 1));
    let curvature = left - 2.0 * centre + right;
    let offset = if curvature < 0.0 {
        (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    Some(lag as f64 + offset)
}

/// Time of the first beat: the comb phase with the most onset energy
pub fn estimate_first_beat(envelope: &OnsetEnvelope, period_frames: f64) -> f64 {
    let n = envelope.len();
    if n == 0 || period_frames <= 0.0 {
        return 0.0;
    }

    let phases = period_frames.ceil() as usize;
    let mut best_phase = 0usize;
    let mut best_score = f64::MIN;
    for phase in 0..phases {
        let mut score = 0.0;
        let mut k = 0usize;
        loop {
            let frame = (phase as f64 + k as f64 * period_frames).round() as usize;
            if frame >= n {
                break;
            }
            score += envelope.values[frame] as f64;
            k += 1;
        }
        if score > best_score {
            best_score = score;
            best_phase = phase;
        }
    }

    envelope.frame_time(best_phase as f64)
}

/// Seconds of leading silence: start of the first frame whose RMS is
/// within `silence_db` of the loudest frame
pub fn leading_silence(
    samples: &[f32],
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    silence_db: f64,
) -> f64 {
    if samples.is_empty() || sample_rate == 0 {
        return 0.0;
    }

    let hop = hop_size.max(1);
    let rms: Vec<f64> = (0..samples.len())
        .step_by(hop)
        .map(|start| {
            let block = &samples[start..(start + frame_size).min(samples.len())];
            let sum: f64 = block.iter().map(|s| (*s as f64) * (*s as f64)).sum();
            (sum / block.len().max(1) as f64).sqrt()
        })
        .collect();

    let peak = rms.iter().cloned().fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return 0.0;
    }

    let threshold = peak * 10f64.powf(-silence_db / 20.0);
    rms.iter()
        .position(|value| *value >= threshold)
        .map(|frame| (frame * hop) as f64 / sample_rate as f64)
        .unwrap_or(0.0)
}

/// Tempo written in a file name, e.g. `drive_128bpm.mp3` or `Song 96 BPM.wav`
pub fn bpm_hint_from_path(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    let bytes = stem.as_bytes();

    let mut search_from = 0;
    while let Some(found) = stem[search_from..].find("bpm") {
        let marker = search_from + found;
        let mut end = marker;
        while end > 0 && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && bytes[start - 1].is_ascii_digit() {
            start -= 1;
        }

        let digits = end - start;
        if (2..=3).contains(&digits) {
            if let Ok(bpm) = stem[start..end].parse::<f64>() {
                if (60.0..=200.0).contains(&bpm) {
                    return Some(bpm);
                }
            }
        }
        search_from = marker + 3;
    }
    None
}
