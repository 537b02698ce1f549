// Render interactor - Orchestrates one beat-synced render job

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::analysis::BeatAnalyzer;
use crate::config::{BeatCutConfig, FailurePolicy};
use crate::domain::model::{EditPlan, FinalArtifact, JobState, LyricLine, RenderJob, Track};
use crate::domain::rules::validate_plan;
use crate::engine::{build_units, EncoderChoice, PassOne, ProgressCallback, SegmentRenderer};
use crate::error::{BeatCutError, BeatCutResult};
use crate::lyrics::{load_lrc, LyricSynchronizer};
use crate::output::Assembler;
use crate::planner::{EditPlanner, LoopStitcher};
use crate::pool::{ClipPool, PoolOptions};
use crate::ports::{ExecutePort, ProbePort};
use crate::utils::Utils;

/// Inputs of one render or plan invocation
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Music track; a synthetic grid and generated audio are used when absent
    pub audio: Option<PathBuf>,
    pub library: PathBuf,
    /// Category subdirectories to draw from; all when empty
    pub categories: Vec<String>,
    pub output: PathBuf,
    /// Target duration; drawn from the configured range when absent
    pub duration: Option<f64>,
    pub seed: Option<u64>,
    pub lyrics: Option<PathBuf>,
    /// Track time the lyric window should start at
    pub lyric_start: Option<f64>,
    /// Manifest location; next to the output when absent
    pub manifest: Option<PathBuf>,
}

impl RenderRequest {
    /// Explicit seed, or one derived from the inputs so reruns plan the same edit
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            let audio = self
                .audio
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| "synthetic".to_string());
            Utils::seed_from_text(&format!(
                "{}|{}|{}|{:?}",
                audio,
                self.library.display(),
                self.categories.join(","),
                self.duration
            ))
        })
    }
}

/// Everything decided before rendering starts
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub track: Track,
    pub pool: ClipPool,
    pub plan: EditPlan,
    /// Caption timeline relative to the first video frame
    pub lyrics: Vec<LyricLine>,
    pub audio_offset: f64,
    pub seed: u64,
}

/// Interactor for the render use case
pub struct RenderInteractor {
    probe_port: Arc<dyn ProbePort>,
    execute_port: Arc<dyn ExecutePort>,
    config: BeatCutConfig,
    progress: Vec<Arc<dyn ProgressCallback>>,
}

impl RenderInteractor {
    /// Create new render interactor with injected ports
    pub fn new(
        probe_port: Arc<dyn ProbePort>,
        execute_port: Arc<dyn ExecutePort>,
        config: BeatCutConfig,
    ) -> Self {
        Self {
            probe_port,
            execute_port,
            config,
            progress: Vec::new(),
        }
    }

    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress.push(callback);
        self
    }

    pub fn config(&self) -> &BeatCutConfig {
        &self.config
    }

    fn planner(&self) -> EditPlanner {
        EditPlanner::new(self.config.planner.clone(), self.config.output.fps)
    }

    /// Beat analysis of a track file
    pub async fn analyze(&self, audio: &Path) -> BeatCutResult<Track> {
        BeatAnalyzer::new(self.probe_port.clone(), self.config.analysis.clone())
            .analyze(audio)
            .await
    }

    /// Analyze, load the pool, plan, stitch and sync lyrics. No rendering work is spent.
    pub async fn prepare(&self, request: &RenderRequest) -> BeatCutResult<PreparedJob> {
        self.config.validate()?;
        let seed = request.effective_seed();
        let mut rng = StdRng::seed_from_u64(seed);
        let target = self.config.planner.resolve_target(request.duration, &mut rng);
        info!("Job seed {:016x}, target duration {:.3}s", seed, target);

        // Lyrics are parsed up front so a bad file fails before analysis
        let lyric_lines = match &request.lyrics {
            Some(path) => Some(load_lrc(path)?),
            None => None,
        };

        let track = match &request.audio {
            Some(path) => {
                let track = self.analyze(path).await?;
                if track.duration - track.start_offset < target {
                    warn!(
                        "Track has {:.3}s after the start offset, shorter than {:.3}s; audio will be padded",
                        track.duration - track.start_offset,
                        target
                    );
                }
                track
            }
            None => {
                info!("No audio given, using a synthetic grid");
                BeatAnalyzer::new(self.probe_port.clone(), self.config.analysis.clone())
                    .synthetic_track((target * 2.0).max(60.0))?
            }
        };

        let options = PoolOptions::from_settings(&self.config.pool)?;
        let pool = ClipPool::load(&request.library, &request.categories, &options, self.probe_port.as_ref()).await?;
        info!("Clip pool: {} clips in {} categories", pool.len(), pool.categories().len());

        let planner = self.planner();
        let plan = planner.plan(&track, &pool, target, seed)?;
        let plan = LoopStitcher::new().make_seamless(plan)?;
        validate_plan(&plan, &planner.rules())?;
        if plan.repetition_relaxed {
            warn!("Anti-repetition relaxed: the pool is too small for the configured window");
        }

        let (audio_offset, lyrics) = match lyric_lines {
            Some(lines) => self.sync_lyrics(&plan, &track, &lines, request.lyric_start)?,
            None => (track.start_offset, Vec::new()),
        };

        Ok(PreparedJob {
            track,
            pool,
            plan,
            lyrics,
            audio_offset,
            seed,
        })
    }

    /// Window the lyrics onto the grid. The audio then starts on the snapped beat.
    fn sync_lyrics(
        &self,
        plan: &EditPlan,
        track: &Track,
        lines: &[LyricLine],
        lyric_start: Option<f64>,
    ) -> BeatCutResult<(f64, Vec<LyricLine>)> {
        let requested = match (lyric_start, lines.first()) {
            (Some(start), _) => start,
            (None, Some(first)) => first.start,
            (None, None) => return Ok((track.start_offset, Vec::new())),
        };

        let synchronizer = LyricSynchronizer::new();
        let synced = match synchronizer.sync(plan, track, lines, requested) {
            Err(BeatCutError::LyricStartBeforeGrid { requested, first_beat }) => {
                warn!(
                    "Lyric start {:.3}s precedes the first beat, starting the window at {:.3}s",
                    requested, first_beat
                );
                synchronizer.sync(plan, track, lines, first_beat)
            }
            other => other,
        };

        match synced {
            Ok(sync) => Ok((sync.snapped_start, sync.video_timeline())),
            Err(BeatCutError::NoLyricsInWindow { start, end }) => {
                warn!(
                    "No lyric lines between {:.3}s and {:.3}s, rendering without captions",
                    start, end
                );
                Ok((track.start_offset, Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Run a full job: plan, Pass 1, Pass 2. Either the final artifact exists or nothing is published.
    pub async fn render(&self, request: &RenderRequest) -> BeatCutResult<FinalArtifact> {
        let prepared = self.prepare(request).await?;
        let encoders = match self.execute_port.available_encoders().await {
            Ok(encoders) => encoders,
            Err(e) => {
                warn!("Cannot list encoders ({}), encoding in software", e);
                Vec::new()
            }
        };
        let choice = EncoderChoice::resolve(self.config.encoder.hardware, &encoders);
        let codec_args = choice.codec_args(&self.config.encoder, &self.config.output);

        let work_dir = self.create_work_dir(prepared.seed).await?;
        let job_id = format!("{}-{:016x}", prepared.track.id, prepared.seed);
        let mut job = RenderJob::new(job_id, prepared.track, prepared.plan, &work_dir, &request.output)
            .with_lyrics(prepared.audio_offset, prepared.lyrics);
        info!("Job {} working in {}", job.id, work_dir.display());

        let result = self.run_job(&mut job, &prepared.pool, codec_args, request).await;

        if self.config.pipeline.keep_intermediates {
            info!("Intermediates kept in {}", work_dir.display());
        } else if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            warn!("Cannot remove work directory {}: {}", work_dir.display(), e);
        }

        match &result {
            Ok(artifact) => info!(
                "Job {} {}: {} ({:.3}s)",
                job.id,
                job.state,
                artifact.video_path.display(),
                artifact.duration
            ),
            Err(e) => warn!("Job {} {}: {}", job.id, job.state, e),
        }
        result
    }

    async fn run_job(
        &self,
        job: &mut RenderJob,
        pool: &ClipPool,
        codec_args: Vec<String>,
        request: &RenderRequest,
    ) -> BeatCutResult<FinalArtifact> {
        job.state = JobState::Rendering;
        let renderer = Arc::new(SegmentRenderer::new(
            self.execute_port.clone(),
            self.config.output.clone(),
            self.config.captions.clone(),
            codec_args,
        ));
        let mut pass = PassOne::new(renderer, self.config.pipeline.workers)
            .keep_on_failure(self.config.pipeline.keep_intermediates);
        for callback in &self.progress {
            pass = pass.with_progress(callback.clone());
        }

        let outputs = match self.render_with_policy(job, pool, &pass).await {
            Ok(outputs) => outputs,
            Err(e) => {
                job.state = JobState::Failed;
                return Err(e);
            }
        };
        for (index, path) in outputs {
            job.record_segment(index, path);
        }

        let assembler = Assembler::new(
            self.execute_port.clone(),
            self.probe_port.clone(),
            self.config.output.clone(),
        )
        .with_manifest_path(request.manifest.clone());

        assembler.assemble(job, request.audio.as_deref(), &request.output).await
    }

    /// Pass 1 under the configured failure policy. A substitution reruns every segment.
    async fn render_with_policy(
        &self,
        job: &mut RenderJob,
        pool: &ClipPool,
        pass: &PassOne,
    ) -> BeatCutResult<BTreeMap<usize, PathBuf>> {
        let fps = self.config.output.fps;
        let mut banned: HashSet<String> = HashSet::new();
        let mut substituted = false;

        loop {
            let units = build_units(&job.plan, &job.lyrics, fps, &job.work_dir);
            match pass.run(units).await {
                Ok(outputs) => return Ok(outputs),
                Err(BeatCutError::Render { index, message })
                    if self.config.pipeline.failure_policy == FailurePolicy::SubstituteOnce && !substituted =>
                {
                    let failed = job
                        .plan
                        .segments
                        .get(index)
                        .map(|segment| segment.clip_id.clone())
                        .ok_or_else(|| BeatCutError::render(index, message.clone()))?;
                    warn!(
                        "Segment {} ({}) failed: {}; substituting and retrying once",
                        index, failed, message
                    );
                    banned.insert(failed.clone());
                    job.plan = self.substitute_clip(&job.plan, pool, &failed, &banned)?;
                    substituted = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replace every segment cut from `clip_id`
    fn substitute_clip(
        &self,
        plan: &EditPlan,
        pool: &ClipPool,
        clip_id: &str,
        banned: &HashSet<String>,
    ) -> BeatCutResult<EditPlan> {
        let planner = self.planner();
        let mut plan = plan.clone();
        for index in 0..plan.segments.len() {
            // A loop head substitution also rewrites the tail
            if plan.segments[index].clip_id == clip_id {
                plan = planner.substitute(&plan, pool, index, banned)?;
            }
        }
        validate_plan(&plan, &planner.rules())?;
        Ok(plan)
    }

    async fn create_work_dir(&self, seed: u64) -> BeatCutResult<PathBuf> {
        let root = self
            .config
            .pipeline
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let name = format!(
            "beatcut-job-{}-{:016x}",
            chrono::Local::now().format("%Y%m%d-%H%M%S%.3f"),
            seed
        );
        let dir = root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Re-run Pass 2 for a persisted manifest
    pub async fn reassemble(
        &self,
        manifest: &Path,
        segments_dir: &Path,
        audio: Option<&Path>,
        output: &Path,
    ) -> BeatCutResult<FinalArtifact> {
        Assembler::new(
            self.execute_port.clone(),
            self.probe_port.clone(),
            self.config.output.clone(),
        )
        .assemble_from_manifest(manifest, segments_dir, audio, output)
        .await
    }
}

#[cfg(test)]
mod tests;
