//! Subscriber setup for the `beatcut` binary

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Where log lines go and how they look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines on stderr
    Pretty,
    /// One JSON object per event, for job runners that collect logs
    Json,
}

/// Logging options taken from the global CLI flags
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Include the emitting module in each line
    pub target: bool,
}

impl LogSettings {
    /// Settings for `--log-level` / `--log-json`. Unknown levels fall back to info.
    pub fn from_flags(level: &str, json: bool) -> Self {
        let level = LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO);
        Self {
            level,
            format: if json { LogFormat::Json } else { LogFormat::Pretty },
            target: level >= LevelFilter::DEBUG,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::from_flags("info", false)
    }
}

/// Owns subscriber initialization for the binary
pub struct LoggingSystem {
    settings: LogSettings,
}

impl LoggingSystem {
    pub fn new(settings: LogSettings) -> Self {
        Self { settings }
    }

    /// Install the global subscriber. `RUST_LOG` wins over the configured level.
    /// Output goes to stderr so stdout stays clean for paths and JSON.
    pub fn initialize(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.settings.level.to_string()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.settings.target)
            .with_writer(std::io::stderr);

        // Tests and embedders may already have installed one
        let _ = match self.settings.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.try_init(),
        };

        tracing::debug!("Logging initialized at {}", self.settings.level);
    }

    /// Version and host banner at job start
    pub fn log_system_info(&self) {
        tracing::info!("BeatCut {}", env!("CARGO_PKG_VERSION"));
        tracing::info!("CPUs available: {}", num_cpus::get());
    }
}
