//! Beat analysis
//!
//! Turns an audio file into a [`Track`]: tempo, a fixed-period beat grid
//! covering the whole track, and a start offset that lands on a beat after
//! any leading silence.

pub mod onset;
pub mod tempo;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::AnalysisSettings;
use crate::domain::model::Track;
use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::ProbePort;
use crate::utils::path::PathUtils;

use onset::OnsetDetector;
use tempo::TempoSearch;

/// Extracts tempo and beat grid from audio
pub struct BeatAnalyzer {
    probe: Arc<dyn ProbePort>,
    settings: AnalysisSettings,
}

impl BeatAnalyzer {
    pub fn new(probe: Arc<dyn ProbePort>, settings: AnalysisSettings) -> Self {
        Self { probe, settings }
    }

    /// Analyze a track file. Fails with `AudioUnreadable` or `NoBeatDetected`.
    pub async fn analyze(&self, track_path: &Path) -> BeatCutResult<Track> {
        info!("Analyzing beats in {}", track_path.display());

        let duration = self
            .probe
            .probe_duration(track_path)
            .await
            .map_err(|e| BeatCutError::AudioUnreadable {
                message: e.to_string(),
            })?;

        let samples = self
            .probe
            .decode_audio(track_path, self.settings.sample_rate, self.settings.max_seconds)
            .await?;

        let id = PathUtils::new()
            .media_id(track_path)
            .unwrap_or_else(|| "track".to_string());
        let hint = tempo::bpm_hint_from_path(track_path);
        if let Some(bpm) = hint {
            debug!("File name suggests {} BPM", bpm);
        }

        let track = self.analyze_samples(
            id,
            Some(track_path.to_path_buf()),
            duration,
            &samples,
            hint,
        )?;

        info!(
            "Detected {:.2} BPM, {} beats, start offset {:.3}s",
            track.bpm,
            track.beat_grid.len(),
            track.start_offset
        );
        Ok(track)
    }

    /// Analyze already-decoded mono samples at the configured sample rate
    pub fn analyze_samples(
        &self,
        id: String,
        path: Option<std::path::PathBuf>,
        duration: f64,
        samples: &[f32],
        bpm_hint: Option<f64>,
    ) -> BeatCutResult<Track> {
        let settings = &self.settings;
        if samples.is_empty() {
            return Err(BeatCutError::AudioUnreadable {
                message: "no samples decoded".to_string(),
            });
        }

        let silence_end = tempo::leading_silence(
            samples,
            settings.sample_rate,
            settings.fft_size,
            settings.hop_size,
            settings.silence_db,
        );

        let detector = OnsetDetector::new(settings.fft_size, settings.hop_size);
        let envelope = detector.envelope(samples, settings.sample_rate)?;

        let prior = bpm_hint.unwrap_or(settings.prior_bpm);
        let search = TempoSearch::new(settings.min_bpm, settings.max_bpm, prior);
        let period_frames = tempo::estimate_period_frames(&envelope, &search).ok_or_else(|| {
            BeatCutError::NoBeatDetected {
                message: "onset envelope has no periodic structure".to_string(),
            }
        })?;

        let bpm = 60.0 * envelope.frame_rate / period_frames;
        let first_beat = tempo::estimate_first_beat(&envelope, period_frames);
        debug!(
            "Tempo period {:.2} frames, first beat {:.3}s, leading silence {:.3}s",
            period_frames, first_beat, silence_end
        );

        let duration = if duration > 0.0 {
            duration
        } else {
            samples.len() as f64 / settings.sample_rate as f64
        };

        Ok(Track::from_grid(id, path, duration, bpm, first_beat)?.with_start_at_or_after(silence_end))
    }

    /// Grid for a job without audio
    pub fn synthetic_track(&self, duration: f64) -> BeatCutResult<Track> {
        Track::synthetic(self.settings.fallback_bpm, duration)
    }
}
