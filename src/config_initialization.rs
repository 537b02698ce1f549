//! Configuration initialization and hierarchy management

use std::path::{Path, PathBuf};

use tracing::info;

use crate::adapters::toml_config::TomlConfigAdapter;
use crate::config::{BeatCutConfig, FailurePolicy, HardwareAcceleration};
use crate::error::{BeatCutError, BeatCutResult};

/// Values given on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub hardware: Option<HardwareAcceleration>,
    pub preset: Option<String>,
    pub fps: Option<u32>,
    pub seamless_loop: Option<bool>,
    pub keep_intermediates: Option<bool>,
    pub failure_policy: Option<FailurePolicy>,
    pub exclusions: Vec<String>,
    pub exclusion_file: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

/// Build the effective configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> BeatCutResult<BeatCutConfig> {
    info!("Initializing configuration hierarchy");

    let adapter = TomlConfigAdapter::new();
    let file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => adapter.discover(),
    };

    let mut config = match file {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            adapter.load(&path)?
        }
        None => {
            info!("No config file found, using defaults");
            BeatCutConfig::default()
        }
    };

    let env_overrides = apply_environment(&mut config, |key| std::env::var(key).ok())?;
    if env_overrides > 0 {
        info!("Applied {} environment variable overrides", env_overrides);
    }

    let cli_overrides = apply_cli_overrides(&mut config, overrides);
    if cli_overrides > 0 {
        info!("Applied {} CLI configuration overrides", cli_overrides);
    }

    config.validate()?;
    Ok(config)
}

/// Apply `BEATCUT_*` variables read through `lookup`
pub fn apply_environment<F>(config: &mut BeatCutConfig, lookup: F) -> BeatCutResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    if let Some(value) = lookup("BEATCUT_WORKERS") {
        config.pipeline.workers = parse_env("BEATCUT_WORKERS", &value)?;
        applied += 1;
    }
    if let Some(value) = lookup("BEATCUT_HWACCEL") {
        config.encoder.hardware = HardwareAcceleration::parse(&value).ok_or_else(|| {
            BeatCutError::config(format!("BEATCUT_HWACCEL has unknown value '{}'", value))
        })?;
        applied += 1;
    }
    if let Some(value) = lookup("BEATCUT_PRESET") {
        config.encoder.hardware_preset = value.clone();
        config.encoder.software_preset = value;
        applied += 1;
    }
    if let Some(value) = lookup("BEATCUT_FPS") {
        config.output.fps = parse_env("BEATCUT_FPS", &value)?;
        applied += 1;
    }

    Ok(applied)
}

/// Apply command-line overrides, returning how many were set
pub fn apply_cli_overrides(config: &mut BeatCutConfig, overrides: &ConfigOverrides) -> usize {
    let mut applied = 0;

    if let Some(workers) = overrides.workers {
        info!("CLI override: workers = {}", workers);
        config.pipeline.workers = workers;
        applied += 1;
    }
    if let Some(hardware) = overrides.hardware {
        info!("CLI override: hardware = {:?}", hardware);
        config.encoder.hardware = hardware;
        applied += 1;
    }
    if let Some(preset) = &overrides.preset {
        config.encoder.hardware_preset = preset.clone();
        config.encoder.software_preset = preset.clone();
        applied += 1;
    }
    if let Some(fps) = overrides.fps {
        config.output.fps = fps;
        applied += 1;
    }
    if let Some(seamless) = overrides.seamless_loop {
        config.planner.seamless_loop = seamless;
        applied += 1;
    }
    if let Some(keep) = overrides.keep_intermediates {
        config.pipeline.keep_intermediates = keep;
        applied += 1;
    }
    if let Some(policy) = overrides.failure_policy {
        config.pipeline.failure_policy = policy;
        applied += 1;
    }
    if !overrides.exclusions.is_empty() {
        config.pool.exclusions.extend(overrides.exclusions.iter().cloned());
        applied += 1;
    }
    if let Some(file) = &overrides.exclusion_file {
        config.pool.exclusion_file = Some(file.clone());
        applied += 1;
    }
    if let Some(dir) = &overrides.work_dir {
        config.pipeline.work_dir = Some(dir.clone());
        applied += 1;
    }

    applied
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> BeatCutResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BeatCutError::config(format!("{} has invalid value '{}'", key, value)))
}
