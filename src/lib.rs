//! BeatCut library
//!
//! Beat-synchronized vertical video assembly: analyze a track, plan cuts
//! from a categorized clip library, render segments in parallel and
//! concatenate them with the music into a final video plus manifest.

pub mod adapters;
pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod lyrics;
pub mod output;
pub mod planner;
pub mod pool;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{RenderInteractor, RenderRequest};
pub use config::BeatCutConfig;
pub use domain::model::{Clip, EditPlan, FinalArtifact, LyricLine, RenderJob, Segment, Track};
pub use error::{BeatCutError, BeatCutResult, ErrorKind};
