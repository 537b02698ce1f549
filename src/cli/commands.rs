//! Command implementations

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::adapters::TomlConfigAdapter;
use crate::app::{AppContainer, DefaultAppContainer};
use crate::cli::args::{AnalyzeArgs, AssembleArgs, ConfigArgs, PlanArgs, RenderArgs};
use crate::cli::{Cli, Commands};
use crate::config::BeatCutConfig;
use crate::config_initialization::{initialize_configuration_hierarchy, ConfigOverrides};
use crate::output::Manifest;
use crate::utils::Utils;

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Render(args) => render(config_path, args).await,
        Commands::Analyze(args) => analyze(config_path, args).await,
        Commands::Plan(args) => plan(config_path, args).await,
        Commands::Assemble(args) => assemble(config_path, args).await,
        Commands::Config(args) => config(config_path, args),
    }
}

fn load_config(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<BeatCutConfig> {
    initialize_configuration_hierarchy(config_path, overrides).context("Failed to load configuration")
}

fn container(config: BeatCutConfig) -> Result<DefaultAppContainer> {
    DefaultAppContainer::new(config).context("Failed to initialize the ffmpeg toolchain")
}

/// Execute the render command
pub async fn render(config_path: Option<&Path>, args: RenderArgs) -> Result<()> {
    let config = load_config(config_path, &args.job.overrides())?;
    let request = args.job.request(args.output.clone(), args.manifest.clone());
    info!("Rendering {}", request.output.display());

    let interactor = container(config)?.render_interactor();
    let artifact = interactor
        .render(&request)
        .await
        .with_context(|| format!("Render of {} failed", request.output.display()))?;

    println!("{}", artifact.video_path.display());
    println!("{}", artifact.manifest_path.display());
    info!(
        "Done: {} ({})",
        artifact.video_path.display(),
        Utils::format_seconds(artifact.duration)
    );
    Ok(())
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    track_id: &'a str,
    bpm: f64,
    beat_period: f64,
    beats: usize,
    start_offset: f64,
    duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    beat_grid: Option<&'a [f64]>,
}

/// Execute the analyze command
pub async fn analyze(config_path: Option<&Path>, args: AnalyzeArgs) -> Result<()> {
    let config = load_config(config_path, &ConfigOverrides::default())?;
    let interactor = container(config)?.render_interactor();
    let track = interactor
        .analyze(&args.audio)
        .await
        .with_context(|| format!("Failed to analyze {}", args.audio.display()))?;

    if args.json {
        let report = AnalysisReport {
            track_id: &track.id,
            bpm: track.bpm,
            beat_period: track.beat_period(),
            beats: track.beat_grid.len(),
            start_offset: track.start_offset,
            duration: track.duration,
            beat_grid: args.beats.then_some(track.beat_grid.as_slice()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Track:        {}", track.id);
        println!("BPM:          {:.2}", track.bpm);
        println!("Beat period:  {:.4}s", track.beat_period());
        println!("Beats:        {}", track.beat_grid.len());
        println!("Start offset: {}", Utils::format_seconds(track.start_offset));
        println!("Duration:     {}", Utils::format_seconds(track.duration));
        if args.beats {
            for beat in &track.beat_grid {
                println!("{:.4}", beat);
            }
        }
    }
    Ok(())
}

/// Execute the plan command
pub async fn plan(config_path: Option<&Path>, args: PlanArgs) -> Result<()> {
    let config = load_config(config_path, &args.job.overrides())?;
    let request = args.job.request(Default::default(), args.manifest.clone());

    let interactor = container(config)?.render_interactor();
    let prepared = interactor.prepare(&request).await.context("Planning failed")?;
    let manifest = Manifest::from_plan(
        &prepared.track,
        &prepared.plan,
        prepared.audio_offset,
        &prepared.lyrics,
    );

    if let Some(path) = &args.manifest {
        manifest
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Manifest written: {}", path.display());
    }
    println!("{}", manifest.to_json()?);
    Ok(())
}

/// Execute the assemble command
pub async fn assemble(config_path: Option<&Path>, args: AssembleArgs) -> Result<()> {
    let config = load_config(config_path, &ConfigOverrides::default())?;
    let interactor = container(config)?.render_interactor();
    let artifact = interactor
        .reassemble(&args.manifest, &args.segments, args.audio.as_deref(), &args.output)
        .await
        .with_context(|| format!("Assembly from {} failed", args.manifest.display()))?;

    println!("{}", artifact.video_path.display());
    Ok(())
}

/// Execute the config command
pub fn config(config_path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    let config = load_config(config_path, &ConfigOverrides::default())?;
    match &args.output {
        Some(path) => {
            TomlConfigAdapter::new()
                .save(&config, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Configuration written to {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
