use std::sync::Arc;

#[cfg(not(feature = "libav"))]
use crate::adapters::FfprobeAdapter;
#[cfg(feature = "libav")]
use crate::adapters::ProbeLibavAdapter;
use crate::adapters::FfmpegAdapter;
use crate::app::render_interactor::RenderInteractor;
use crate::config::BeatCutConfig;
use crate::engine::LogProgressCallback;
use crate::error::BeatCutResult;
use crate::ports::{ExecutePort, ProbePort};

pub trait AppContainer: Send + Sync {
    fn render_interactor(&self) -> Arc<RenderInteractor>;
}

pub struct DefaultAppContainer {
    render_interactor: Arc<RenderInteractor>,
}

impl DefaultAppContainer {
    /// Wire the ffmpeg-backed adapters. Fails when ffmpeg or ffprobe is missing.
    pub fn new(config: BeatCutConfig) -> BeatCutResult<Self> {
        #[cfg(feature = "libav")]
        let probe_port: Arc<dyn ProbePort> = Arc::new(ProbeLibavAdapter::new()?);
        #[cfg(not(feature = "libav"))]
        let probe_port: Arc<dyn ProbePort> = Arc::new(FfprobeAdapter::new()?);
        let execute_port: Arc<dyn ExecutePort> = Arc::new(FfmpegAdapter::new()?);

        Ok(Self::with_ports(probe_port, execute_port, config))
    }

    /// Wire explicit ports, e.g. fakes in tests
    pub fn with_ports(
        probe_port: Arc<dyn ProbePort>,
        execute_port: Arc<dyn ExecutePort>,
        config: BeatCutConfig,
    ) -> Self {
        let render_interactor = Arc::new(
            RenderInteractor::new(Arc::clone(&probe_port), Arc::clone(&execute_port), config)
                .with_progress(Arc::new(LogProgressCallback)),
        );
        Self { render_interactor }
    }
}

impl AppContainer for DefaultAppContainer {
    fn render_interactor(&self) -> Arc<RenderInteractor> {
        Arc::clone(&self.render_interactor)
    }
}
