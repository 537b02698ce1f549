//! Spectral-flux onset envelope

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::error::{BeatCutError, BeatCutResult};

/// Onset strength per analysis frame. Frame `i` is centred at `i / frame_rate` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    /// Frames per second
    pub frame_rate: f64,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frame_time(&self, frame: f64) -> f64 {
        frame / self.frame_rate
    }
}

/// Computes half-wave rectified log-magnitude flux over centred STFT frames
pub struct OnsetDetector {
    fft_size: usize,
    hop_size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl OnsetDetector {
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let window = (0..fft_size).map(|i| hann_value(i, fft_size)).collect();
        Self {
            fft_size,
            hop_size: hop_size.max(1),
            plan,
            window,
        }
    }

    pub fn envelope(&self, samples: &[f32], sample_rate: u32) -> BeatCutResult<OnsetEnvelope> {
        let frame_rate = sample_rate as f64 / self.hop_size as f64;
        let half = self.fft_size / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * half];
        padded[half..half + samples.len()].copy_from_slice(samples);

        if padded.len() < self.fft_size {
            return Ok(OnsetEnvelope {
                values: Vec::new(),
                frame_rate,
            });
        }

        let frames = 1 + (padded.len() - self.fft_size) / self.hop_size;
        let mut input = self.plan.make_input_vec();
        let mut spectrum = self.plan.make_output_vec();
        let mut scratch = self.plan.make_scratch_vec();
        let mut previous: Vec<f32> = vec![0.0; spectrum.len()];
        let mut values = Vec::with_capacity(frames);

        for frame in 0..frames {
            let start = frame * self.hop_size;
            let block = &padded[start..start + self.fft_size];
            for ((slot, sample), weight) in input.iter_mut().zip(block).zip(&self.window) {
                *slot = sample * weight;
            }

            self.plan
                .process_with_scratch(&mut input, &mut spectrum, &mut scratch)
                .map_err(|e| BeatCutError::AudioUnreadable {
                    message: format!("spectral analysis failed: {}", e),
                })?;

            let mut flux = 0.0f32;
            for (bin, prev) in spectrum.iter().zip(previous.iter_mut()) {
                let magnitude = log_magnitude(bin);
                if frame > 0 {
                    flux += (magnitude - *prev).max(0.0);
                }
                *prev = magnitude;
            }
            values.push(flux);
        }

        Ok(OnsetEnvelope { values, frame_rate })
    }
}

impl fmt::Debug for OnsetDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnsetDetector")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

fn log_magnitude(bin: &Complex32) -> f32 {
    bin.norm().ln_1p()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
