//! Output verification

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{BeatCutError, BeatCutResult};
use crate::output::VerificationResult;
use crate::ports::ProbePort;

/// Frames of slack allowed between planned and probed duration
const FRAME_TOLERANCE: f64 = 2.0;

/// Checks an assembled file against its plan before it is published
pub struct OutputVerifier {
    probe: Arc<dyn ProbePort>,
    frame_interval: f64,
}

impl OutputVerifier {
    pub fn new(probe: Arc<dyn ProbePort>, frame_interval: f64) -> Self {
        Self {
            probe,
            frame_interval,
        }
    }

    /// Probe `path` and compare its duration with `expected`
    pub async fn verify(&self, path: &Path, expected: f64) -> BeatCutResult<VerificationResult> {
        let file_size = std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
        let tolerance = self.frame_interval * FRAME_TOLERANCE;

        if file_size == 0 {
            return Ok(VerificationResult {
                success: false,
                expected_duration: expected,
                actual_duration: 0.0,
                tolerance,
                file_size,
                error: Some("output file is empty".to_string()),
            });
        }

        let actual = self
            .probe
            .probe_duration(path)
            .await
            .map_err(|e| BeatCutError::assembly(format!("cannot probe assembled output: {}", e)))?;
        let difference = (actual - expected).abs();
        let success = difference <= tolerance;

        let result = VerificationResult {
            success,
            expected_duration: expected,
            actual_duration: actual,
            tolerance,
            file_size,
            error: if success {
                None
            } else {
                Some(format!(
                    "duration {:.3}s differs from planned {:.3}s by {:.3}s",
                    actual, expected, difference
                ))
            },
        };

        if success {
            info!("Verification passed: {:.3}s ({} bytes)", actual, file_size);
        } else {
            warn!("Verification failed: {:?}", result);
        }
        Ok(result)
    }

    /// Like `verify`, but a mismatch is an assembly error
    pub async fn ensure(&self, path: &Path, expected: f64) -> BeatCutResult<f64> {
        let result = self.verify(path, expected).await?;
        match result.error {
            None => Ok(result.actual_duration),
            Some(message) => Err(BeatCutError::assembly(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProbe(f64);

    #[async_trait]
    impl ProbePort for FixedProbe {
        async fn probe_duration(&self, _path: &Path) -> BeatCutResult<f64> {
            Ok(self.0)
        }

        async fn decode_audio(&self, _path: &Path, _rate: u32, _max: f64) -> BeatCutResult<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn accepts_duration_within_two_frames() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"data").unwrap();
        let verifier = OutputVerifier::new(Arc::new(FixedProbe(12.13)), 1.0 / 30.0);

        let actual = verifier.ensure(file.path(), 12.097).await.unwrap();
        assert_eq!(actual, 12.13);
    }

    #[tokio::test]
    async fn rejects_short_output() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"data").unwrap();
        let verifier = OutputVerifier::new(Arc::new(FixedProbe(10.0)), 1.0 / 30.0);

        let err = verifier.ensure(file.path(), 12.097).await.unwrap_err();
        assert!(matches!(err, BeatCutError::Assembly { .. }));
    }

    #[tokio::test]
    async fn empty_file_fails_without_probing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let verifier = OutputVerifier::new(Arc::new(FixedProbe(12.0)), 1.0 / 30.0);
        let result = verifier.verify(file.path(), 12.0).await.unwrap();
        assert!(!result.success);
    }
}
