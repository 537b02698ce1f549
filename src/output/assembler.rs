//! Pass 2: stream-copy concatenation, audio mux and publish
//!
//! Runs only after every Pass 1 intermediate exists. The manifest is staged
//! first, the container is built under a staging name and verified, then both
//! are renamed into place together. A failure at any step publishes nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tracing::{debug, info};

use crate::config::{OutputSettings, SyntheticAudio};
use crate::domain::model::{segment_file_path, FinalArtifact, JobState, RenderJob};
use crate::error::{BeatCutError, BeatCutResult};
use crate::output::manifest::Manifest;
use crate::output::verifier::OutputVerifier;
use crate::output::writer::OutputWriter;
use crate::ports::{AudioSource, ConcatMux, ExecutePort, ProbePort};
use crate::utils::path::PathUtils;

/// Name of the concat-demuxer list inside a work directory
pub const CONCAT_LIST: &str = "concat.txt";

pub struct Assembler {
    exec: Arc<dyn ExecutePort>,
    verifier: OutputVerifier,
    output: OutputSettings,
    writer: OutputWriter,
    path_utils: PathUtils,
    manifest_path: Option<PathBuf>,
}

impl Assembler {
    pub fn new(exec: Arc<dyn ExecutePort>, probe: Arc<dyn ProbePort>, output: OutputSettings) -> Self {
        let verifier = OutputVerifier::new(probe, output.frame_interval());
        Self {
            exec,
            verifier,
            output,
            writer: OutputWriter::new(),
            path_utils: PathUtils::new(),
            manifest_path: None,
        }
    }

    /// Write the manifest here instead of next to the video
    pub fn with_manifest_path(mut self, path: Option<PathBuf>) -> Self {
        self.manifest_path = path;
        self
    }

    /// Audio stream for Pass 2: the track cut at `offset`, or generated audio
    pub fn audio_source(&self, audio: Option<&Path>, offset: f64) -> AudioSource {
        match audio {
            Some(path) => AudioSource::Track {
                path: path.to_path_buf(),
                offset,
            },
            None => {
                let rate = self.output.audio_sample_rate;
                let lavfi = match &self.output.synthetic_audio {
                    SyntheticAudio::Silence => format!("anullsrc=r={}:cl=stereo", rate),
                    SyntheticAudio::Tone { frequency } => {
                        format!("sine=frequency={}:sample_rate={}", frequency, rate)
                    }
                };
                AudioSource::Synthetic { lavfi }
            }
        }
    }

    /// Concatenate a finished job in plan order, mux audio and publish
    pub async fn assemble(
        &self,
        job: &mut RenderJob,
        audio: Option<&Path>,
        output: &Path,
    ) -> BeatCutResult<FinalArtifact> {
        if !job.is_complete() {
            job.state = JobState::Failed;
            return Err(BeatCutError::assembly(format!(
                "{} of {} segments rendered",
                job.segment_outputs.len(),
                job.plan.len()
            )));
        }
        job.state = JobState::Assembling;
        info!("Pass 2: assembling {} segments into {}", job.plan.len(), output.display());

        let result = self.assemble_job(job, audio, output).await;
        job.state = match result {
            Ok(_) => JobState::Completed,
            Err(_) => JobState::Failed,
        };
        result
    }

    async fn assemble_job(
        &self,
        job: &RenderJob,
        audio: Option<&Path>,
        output: &Path,
    ) -> BeatCutResult<FinalArtifact> {
        let intermediates = job.ordered_outputs()?;
        let manifest_path = self.manifest_location(output);
        let staged_manifest = self
            .writer
            .stage_bytes(&manifest_path, Manifest::from_job(job).to_json()?.as_bytes())?;

        let source = self.audio_source(audio, job.audio_offset);
        let (video, duration) = self
            .concat(&job.work_dir, &intermediates, source, job.plan.total_duration, output)
            .await?;
        self.writer
            .publish_with_manifest(video, output, staged_manifest, &manifest_path)?;

        Ok(FinalArtifact {
            video_path: output.to_path_buf(),
            manifest_path,
            duration,
        })
    }

    /// Re-run Pass 2 from a persisted manifest and kept intermediates
    pub async fn assemble_from_manifest(
        &self,
        manifest_path: &Path,
        segments_dir: &Path,
        audio: Option<&Path>,
        output: &Path,
    ) -> BeatCutResult<FinalArtifact> {
        let manifest = Manifest::load(manifest_path)?;
        info!(
            "Re-assembling {} segments of track {} from {}",
            manifest.segments.len(),
            manifest.track_id,
            manifest_path.display()
        );

        let intermediates = manifest
            .segments
            .iter()
            .map(|segment| {
                let path = segment_file_path(segments_dir, segment.index);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(BeatCutError::assembly(format!(
                        "missing intermediate for segment {}: {}",
                        segment.index,
                        path.display()
                    )))
                }
            })
            .collect::<BeatCutResult<Vec<_>>>()?;

        let copy_path = self.manifest_location(output);
        let staged_copy = if copy_path != manifest_path {
            Some(self.writer.stage_bytes(&copy_path, manifest.to_json()?.as_bytes())?)
        } else {
            None
        };

        let source = self.audio_source(audio, manifest.audio_offset);
        let (video, duration) = self
            .concat(segments_dir, &intermediates, source, manifest.total_duration, output)
            .await?;
        match staged_copy {
            Some(copy) => self.writer.publish_with_manifest(video, output, copy, &copy_path)?,
            None => self.writer.publish(video, output)?,
        }

        Ok(FinalArtifact {
            video_path: output.to_path_buf(),
            manifest_path: copy_path,
            duration,
        })
    }

    fn manifest_location(&self, output: &Path) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.path_utils.manifest_path_for(output))
    }

    /// Write the concat list, mux into a staging file and verify it.
    /// Returns the unpublished staging file and its probed duration.
    async fn concat(
        &self,
        list_dir: &Path,
        intermediates: &[PathBuf],
        audio: AudioSource,
        duration: f64,
        output: &Path,
    ) -> BeatCutResult<(TempPath, f64)> {
        let list_file = list_dir.join(CONCAT_LIST);
        let list: String = intermediates
            .iter()
            .map(|path| {
                let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                format!("{}\n", self.path_utils.concat_entry(&absolute))
            })
            .collect();
        tokio::fs::write(&list_file, list).await.map_err(|e| {
            BeatCutError::assembly(format!("cannot write {}: {}", list_file.display(), e))
        })?;
        debug!("Concat list: {}", list_file.display());

        let staging = self.writer.staging_path(output)?;
        let request = ConcatMux {
            list_file,
            audio,
            duration,
            audio_bitrate: self.output.audio_bitrate.clone(),
            audio_sample_rate: self.output.audio_sample_rate,
            output: staging.to_path_buf(),
        };

        self.exec.concat_and_mux(&request).await.map_err(|e| match e {
            BeatCutError::Assembly { .. } => e,
            other => BeatCutError::assembly(other.to_string()),
        })?;

        let actual = self.verifier.ensure(&staging, duration).await?;
        Ok((staging, actual))
    }
}
