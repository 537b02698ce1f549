//! Bounded Pass 1 worker pool
//!
//! Units are rendered concurrently, at most `workers` at a time. Results are
//! collected into an index-ordered map. The first failure flips a shared
//! cancel flag: queued units stop before starting, in-flight units finish,
//! and every intermediate of the attempt is removed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::progress::{ProgressCallback, ProgressTracker};
use super::segment::{RenderUnit, SegmentRenderer};
use crate::error::{BeatCutError, BeatCutResult};

pub struct PassOne {
    renderer: Arc<SegmentRenderer>,
    workers: usize,
    keep_on_failure: bool,
    callbacks: Vec<Arc<dyn ProgressCallback>>,
}

impl PassOne {
    pub fn new(renderer: Arc<SegmentRenderer>, workers: usize) -> Self {
        Self {
            renderer,
            workers: workers.max(1),
            keep_on_failure: false,
            callbacks: Vec::new(),
        }
    }

    /// Leave intermediates on disk when the attempt fails
    pub fn keep_on_failure(mut self, keep: bool) -> Self {
        self.keep_on_failure = keep;
        self
    }

    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Render every unit. Succeeds only when all of them succeed.
    pub async fn run(&self, units: Vec<RenderUnit>) -> BeatCutResult<BTreeMap<usize, PathBuf>> {
        let total = units.len();
        let tracker = ProgressTracker::new(total);
        for callback in &self.callbacks {
            tracker.add_callback(callback.clone());
        }
        tracker.start();
        info!("Rendering {} segments with {} workers", total, self.workers);

        let all_outputs: Vec<PathBuf> = units.iter().map(|u| u.output.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        let mut tasks = JoinSet::new();

        for unit in units {
            let renderer = self.renderer.clone();
            let semaphore = semaphore.clone();
            let cancel_rx = cancel_rx.clone();
            let cancel_tx = cancel_tx.clone();
            let tracker = tracker.clone();

            tasks.spawn(async move {
                let index = unit.segment.index;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Err(BeatCutError::Cancelled)),
                };
                if *cancel_rx.borrow() {
                    debug!("Segment {} skipped after cancellation", index);
                    return (index, Err(BeatCutError::Cancelled));
                }

                let result = renderer.render_segment(&unit).await;
                match &result {
                    Ok(()) => tracker.segment_done(index),
                    // Raised while the permit is held so the next queued unit sees it
                    Err(_) => {
                        cancel_tx.send_replace(true);
                    }
                }
                (index, result.map(|_| unit.output))
            });
        }

        let mut outputs: BTreeMap<usize, PathBuf> = BTreeMap::new();
        let mut first_error: Option<BeatCutError> = None;
        let mut failed: Vec<usize> = Vec::new();
        let mut panicked = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(path))) => {
                    outputs.insert(index, path);
                }
                Ok((_, Err(BeatCutError::Cancelled))) => {}
                Ok((index, Err(e))) => {
                    failed.push(index);
                    if first_error.is_none() {
                        warn!("Segment {} failed, cancelling remaining work: {}", index, e);
                        first_error = Some(e);
                    }
                }
                Err(join_error) => {
                    warn!("Render worker aborted: {}", join_error);
                    panicked = true;
                    cancel_tx.send_replace(true);
                }
            }
        }

        if first_error.is_none() && (panicked || outputs.len() != total) {
            let missing = (0..total)
                .find(|index| !outputs.contains_key(index) && !failed.contains(index))
                .unwrap_or(0);
            first_error = Some(BeatCutError::render(missing, "render worker did not finish"));
        }

        if let Some(error) = first_error {
            tracker.error(&error.to_string());
            if self.keep_on_failure {
                warn!("Keeping {} intermediates for diagnosis", outputs.len());
            } else {
                remove_intermediates(&all_outputs).await;
            }
            return Err(error);
        }

        tracker.complete();
        Ok(outputs)
    }
}

/// Delete intermediate files, ignoring ones that were never written
pub async fn remove_intermediates(paths: &[PathBuf]) {
    for path in paths {
        remove_quietly(path).await;
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}
