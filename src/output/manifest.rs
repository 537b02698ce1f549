//! Job manifest: the only state a render leaves behind
//!
//! Downstream tooling (preview, re-render, analytics) reads this file, so
//! field names are part of the external contract.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::{EditPlan, LyricLine, RenderJob, Segment, Track};
use crate::error::{BeatCutError, BeatCutResult};
use crate::output::writer::OutputWriter;

/// Bumped whenever a field changes meaning
pub const MANIFEST_VERSION: u32 = 1;

/// One planned cut as recorded in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSegment {
    pub index: usize,
    pub clip_id: String,
    pub clip_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "in")]
    pub source_in: f64,
    #[serde(rename = "out")]
    pub source_out: f64,
    pub duration: f64,
    pub speed: f64,
}

impl From<&Segment> for ManifestSegment {
    fn from(segment: &Segment) -> Self {
        Self {
            index: segment.index,
            clip_id: segment.clip_id.clone(),
            clip_path: segment.clip_path.clone(),
            category: segment.category.clone(),
            source_in: segment.source_in,
            source_out: segment.source_out,
            duration: segment.duration,
            speed: segment.speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub track_id: String,
    pub bpm: f64,
    pub beat_period: f64,
    pub seed: u64,
    /// Where the audio was cut from the track
    pub audio_offset: f64,
    pub total_duration: f64,
    pub target_duration: f64,
    pub segments: Vec<ManifestSegment>,
    pub loop_eligible: bool,
    pub repetition_relaxed: bool,
    /// Caption timeline relative to the start of the video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyric_timeline: Option<Vec<LyricLine>>,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn from_plan(track: &Track, plan: &EditPlan, audio_offset: f64, lyrics: &[LyricLine]) -> Self {
        Self {
            version: MANIFEST_VERSION,
            track_id: track.id.clone(),
            bpm: plan.bpm,
            beat_period: plan.beat_period,
            seed: plan.seed,
            audio_offset,
            total_duration: plan.total_duration,
            target_duration: plan.target_duration,
            segments: plan.segments.iter().map(ManifestSegment::from).collect(),
            loop_eligible: plan.loop_eligible,
            repetition_relaxed: plan.repetition_relaxed,
            lyric_timeline: if lyrics.is_empty() {
                None
            } else {
                Some(lyrics.to_vec())
            },
            created_at: Utc::now(),
        }
    }

    pub fn from_job(job: &RenderJob) -> Self {
        Self::from_plan(&job.track, &job.plan, job.audio_offset, &job.lyrics)
    }

    /// Segments must be listed in index order without gaps
    pub fn validate(&self) -> BeatCutResult<()> {
        if self.version > MANIFEST_VERSION {
            return Err(BeatCutError::assembly(format!(
                "manifest version {} is newer than supported version {}",
                self.version, MANIFEST_VERSION
            )));
        }
        if self.segments.is_empty() {
            return Err(BeatCutError::assembly("manifest lists no segments"));
        }
        for (position, segment) in self.segments.iter().enumerate() {
            if segment.index != position {
                return Err(BeatCutError::assembly(format!(
                    "manifest segment at position {} has index {}",
                    position, segment.index
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> BeatCutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> BeatCutResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BeatCutError::assembly(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write atomically; readers never see a half-written manifest
    pub fn save(&self, path: &Path) -> BeatCutResult<()> {
        let json = self.to_json()?;
        OutputWriter::new().write_atomic(path, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Clip;

    fn plan() -> EditPlan {
        let clip = Clip::new("wave", "/lib/sea/wave.mp4", 6.0);
        EditPlan {
            segments: vec![
                Segment::from_clip(0, &clip, Some("sea".into()), 1.0, 0.5, 1.0),
                Segment::from_clip(1, &clip, None, 2.0, 1.0, 0.98),
            ],
            total_duration: 1.5,
            target_duration: 1.5,
            beat_period: 0.5,
            bpm: 120.0,
            loop_eligible: true,
            repetition_relaxed: false,
            seed: 42,
        }
    }

    #[test]
    fn serializes_contract_field_names() {
        let track = Track::synthetic(120.0, 10.0).unwrap();
        let manifest = Manifest::from_plan(&track, &plan(), 0.0, &[]);
        let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();

        assert_eq!(value["track_id"], "synthetic");
        assert_eq!(value["bpm"], 120.0);
        assert_eq!(value["loop_eligible"], true);
        assert_eq!(value["segments"][0]["clip_id"], "wave");
        assert_eq!(value["segments"][0]["in"], 1.0);
        assert_eq!(value["segments"][0]["out"], 1.5);
        assert!(value.get("lyric_timeline").is_none());
    }

    #[test]
    fn lyric_timeline_is_recorded() {
        let track = Track::synthetic(120.0, 10.0).unwrap();
        let lyrics = vec![LyricLine::new(0.0, 1.0, "hello")];
        let manifest = Manifest::from_plan(&track, &plan(), 2.0, &lyrics);
        assert_eq!(manifest.lyric_timeline.as_deref(), Some(lyrics.as_slice()));
        assert_eq!(manifest.audio_offset, 2.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.manifest.json");
        let track = Track::synthetic(120.0, 10.0).unwrap();
        let manifest = Manifest::from_plan(&track, &plan(), 0.0, &[]);

        manifest.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded.segments.len(), 2);
        assert_eq!(loaded.segments[0].category.as_deref(), Some("sea"));
        assert_eq!(loaded.created_at, manifest.created_at);
    }

    #[test]
    fn rejects_gapped_segments() {
        let track = Track::synthetic(120.0, 10.0).unwrap();
        let mut manifest = Manifest::from_plan(&track, &plan(), 0.0, &[]);
        manifest.segments.remove(0);
        assert!(manifest.validate().is_err());
    }
}
