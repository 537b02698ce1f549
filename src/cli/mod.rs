//! CLI module for BeatCut
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{AnalyzeArgs, AssembleArgs, ConfigArgs, JobArgs, PlanArgs, RenderArgs};

/// BeatCut vertical video assembler
///
/// Cuts b-roll clips to the beat of a music track and renders a vertical
/// video plus a JSON manifest describing every cut.
#[derive(Parser, Debug)]
#[command(name = "beatcut")]
#[command(about = "BeatCut - beat-synced vertical videos from a clip library")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (TOML or YAML); ./beatcut.toml is used when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan, render and assemble a video
    Render(RenderArgs),
    /// Detect tempo and beat grid of a track
    Analyze(AnalyzeArgs),
    /// Plan without rendering and print the manifest
    Plan(PlanArgs),
    /// Re-run assembly from a manifest and kept intermediates
    Assemble(AssembleArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}
