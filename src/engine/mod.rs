//! Segment rendering engine (Pass 1)

pub mod hwaccel;
pub mod pass_one;
pub mod progress;
pub mod segment;

pub use hwaccel::EncoderChoice;
pub use pass_one::{remove_intermediates, PassOne};
pub use progress::{LogProgressCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use segment::{build_units, FilterGraph, RenderUnit, SegmentRenderer};
