//! Pass 1 progress reporting

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Receives render progress events
pub trait ProgressCallback: Send + Sync {
    /// Rendering of `total` segments begins
    fn on_start(&self, total: usize);

    /// Segment `index` finished; `completed` of `total` are done
    fn on_segment(&self, index: usize, completed: usize, total: usize);

    /// Every segment rendered
    fn on_complete(&self, elapsed: Duration);

    /// Rendering stopped on an error
    fn on_error(&self, error: &str);
}

/// Snapshot of Pass 1 progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub elapsed: Duration,
    /// Estimated time remaining
    pub eta: Option<Duration>,
}

/// Thread-safe counter shared by Pass 1 workers
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<TrackerInner>>,
    callbacks: Arc<Mutex<Vec<Arc<dyn ProgressCallback>>>>,
}

struct TrackerInner {
    completed: usize,
    total: usize,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                completed: 0,
                total,
                start_time: Instant::now(),
            })),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn ProgressCallback>) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    pub fn start(&self) {
        let total = match self.inner.lock() {
            Ok(mut inner) => {
                inner.completed = 0;
                inner.start_time = Instant::now();
                inner.total
            }
            Err(_) => return,
        };
        self.notify_callbacks(|cb| cb.on_start(total));
    }

    /// Record one finished segment
    pub fn segment_done(&self, index: usize) {
        let (completed, total) = match self.inner.lock() {
            Ok(mut inner) => {
                inner.completed += 1;
                (inner.completed, inner.total)
            }
            Err(_) => return,
        };
        self.notify_callbacks(|cb| cb.on_segment(index, completed, total));
    }

    pub fn complete(&self) {
        let elapsed = self.info().map(|info| info.elapsed).unwrap_or_default();
        self.notify_callbacks(|cb| cb.on_complete(elapsed));
    }

    pub fn error(&self, error: &str) {
        self.notify_callbacks(|cb| cb.on_error(error));
    }

    pub fn info(&self) -> Option<ProgressInfo> {
        let inner = self.inner.lock().ok()?;
        let elapsed = inner.start_time.elapsed();
        let percent = if inner.total == 0 {
            100.0
        } else {
            (inner.completed as f64 / inner.total as f64 * 100.0).min(100.0)
        };
        let eta = if inner.completed > 0 && inner.completed < inner.total {
            let per_segment = elapsed.as_secs_f64() / inner.completed as f64;
            Some(Duration::from_secs_f64(
                per_segment * (inner.total - inner.completed) as f64,
            ))
        } else {
            None
        };
        Some(ProgressInfo {
            completed: inner.completed,
            total: inner.total,
            percent,
            elapsed,
            eta,
        })
    }

    fn notify_callbacks<F>(&self, f: F)
    where
        F: Fn(&dyn ProgressCallback),
    {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                f(callback.as_ref());
            }
        }
    }
}

/// Reports progress through `tracing`
pub struct LogProgressCallback;

impl ProgressCallback for LogProgressCallback {
    fn on_start(&self, total: usize) {
        info!("Pass 1: rendering {} segments", total);
    }

    fn on_segment(&self, index: usize, completed: usize, total: usize) {
        info!("Segment {} rendered ({}/{})", index, completed, total);
    }

    fn on_complete(&self, elapsed: Duration) {
        info!("Pass 1 finished in {:.1}s", elapsed.as_secs_f64());
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Pass 1 failed: {}", error);
    }
}
