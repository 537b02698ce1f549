// TOML config adapter - Configuration files in TOML (or YAML) form

use std::path::{Path, PathBuf};

use crate::config::BeatCutConfig;
use crate::error::{BeatCutError, BeatCutResult};

/// File names searched, in order, when no `--config` is given
const DEFAULT_CONFIG_PATHS: &[&str] = &["beatcut.toml", "config/beatcut.toml"];

/// Reads and writes `BeatCutConfig` files
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    pub fn new() -> Self {
        Self
    }

    /// First default config file that exists in the working directory
    pub fn discover(&self) -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Load a config file; `.yaml`/`.yml` go through serde_yaml, anything else is TOML
    pub fn load(&self, path: &Path) -> BeatCutResult<BeatCutConfig> {
        if !path.exists() {
            return Err(BeatCutError::config(format!(
                "config file does not exist: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| {
                BeatCutError::config(format!("failed to parse {}: {}", path.display(), e))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                BeatCutError::config(format!("failed to parse {}: {}", path.display(), e))
            })
        }
    }

    /// Write a config as TOML, creating the parent directory
    pub fn save(&self, config: &BeatCutConfig, path: &Path) -> BeatCutResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, config.to_toml()?)?;
        Ok(())
    }
}

impl Default for TomlConfigAdapter {
    fn default() -> Self {
        Self::new()
    }
}
