//! Pass 2 assembly, manifest persistence and output verification

use serde::{Deserialize, Serialize};

pub mod assembler;
pub mod manifest;
pub mod verifier;
pub mod writer;

pub use assembler::Assembler;
pub use manifest::{Manifest, ManifestSegment, MANIFEST_VERSION};
pub use verifier::OutputVerifier;
pub use writer::OutputWriter;

/// Output verification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Verification passed
    pub success: bool,
    /// Planned duration
    pub expected_duration: f64,
    /// Duration reported by the probe
    pub actual_duration: f64,
    /// Allowed absolute difference
    pub tolerance: f64,
    /// Output file size in bytes
    pub file_size: u64,
    /// Error message if verification failed
    pub error: Option<String>,
}
