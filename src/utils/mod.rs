//! Common utilities and helpers

pub mod logging;
pub mod path;
pub mod time;

/// Utility functions for BeatCut
pub struct Utils;

impl Utils {
    /// Format a duration in seconds for display
    pub fn format_seconds(seconds: f64) -> String {
        time::TimeParser::new().format_time(seconds)
    }

    /// Stable 64-bit seed derived from text (FNV-1a).
    ///
    /// Used when no explicit seed is given so the same inputs plan the same edit.
    pub fn seed_from_text(text: &str) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        text.bytes()
            .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
    }

    /// Default worker count: four, bounded by available CPUs
    pub fn default_worker_count() -> usize {
        num_cpus::get().clamp(1, 4)
    }
}
