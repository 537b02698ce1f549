//! BeatCut CLI
//!
//! Cuts b-roll clips to the beat of a music track and renders a vertical
//! video with a JSON manifest of every cut.
//!
//! # Usage
//!
//! ```bash
//! beatcut analyze --audio track.mp3
//! beatcut render --audio track.mp3 --library clips/ --category city --output reel.mp4
//! beatcut plan --library clips/ --duration 12 --seed 7
//! beatcut assemble --manifest reel.manifest.json --segments work/ --output again.mp4
//! ```

use clap::Parser;
use tracing::{error, info};

use beatcut_cli::cli::{commands, Cli};
use beatcut_cli::error::BeatCutError;
use beatcut_cli::utils::logging::{LogSettings, LoggingSystem};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingSystem::new(LogSettings::from_flags(&cli.log_level, cli.log_json));
    logging.initialize();
    logging.log_system_info();

    if let Err(err) = commands::run(cli).await {
        report(&err);
        std::process::exit(1);
    }
    info!("BeatCut completed successfully");
}

/// Print the failure with its kind and, for segment failures, the plan index
fn report(err: &anyhow::Error) {
    let cause = err.chain().find_map(|cause| cause.downcast_ref::<BeatCutError>());
    match cause {
        Some(cause) => {
            error!("{} error: {:#}", cause.kind(), err);
            match cause.segment_index() {
                Some(index) => eprintln!("error [{}] at segment {}: {:#}", cause.kind(), index, err),
                None => eprintln!("error [{}]: {:#}", cause.kind(), err),
            }
        }
        None => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
        }
    }
}
