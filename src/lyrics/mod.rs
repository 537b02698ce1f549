//! Timed lyrics: LRC parsing and beat-grid synchronization

pub mod lrc;
pub mod sync;

pub use lrc::{load_lrc, parse_lrc};
pub use sync::{LyricSync, LyricSynchronizer};
