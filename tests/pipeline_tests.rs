//! End-to-end job tests with in-memory ports (no ffmpeg required)

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beatcut_cli::config::FailurePolicy;
use beatcut_cli::output::Manifest;
use beatcut_cli::ports::{ConcatMux, ExecutePort, ProbePort, SegmentEncode};
use beatcut_cli::*;
use tempfile::TempDir;

/// Test utilities for job runs
mod test_utils {
    use super::*;

    /// Clips probe at 8 s; an assembled output reports the duration written into it
    pub struct FakeProbe;

    #[async_trait]
    impl ProbePort for FakeProbe {
        async fn probe_duration(&self, path: &Path) -> BeatCutResult<f64> {
            Ok(std::fs::read_to_string(path)
                .ok()
                .and_then(|text| text.trim().parse().ok())
                .unwrap_or(8.0))
        }

        async fn decode_audio(&self, path: &Path, _rate: u32, _max: f64) -> BeatCutResult<Vec<f32>> {
            Err(BeatCutError::AudioUnreadable {
                message: format!("{} is not audio", path.display()),
            })
        }
    }

    /// Encoder stand-in. Clips named in `vanished` behave like files deleted mid-render.
    #[derive(Default)]
    pub struct FakeExec {
        pub vanished: HashSet<String>,
        pub slow_first: bool,
        pub concat_lists: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExecutePort for FakeExec {
        async fn encode_segment(&self, request: &SegmentEncode) -> BeatCutResult<()> {
            if self.slow_first {
                // Early segments finish last
                let delay = 40u64.saturating_sub(3 * request.index as u64);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let stem = request
                .source
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.vanished.contains(&stem) {
                return Err(BeatCutError::render(
                    request.index,
                    format!("{}: No such file or directory", request.source.display()),
                ));
            }
            tokio::fs::write(&request.output, b"frames").await?;
            Ok(())
        }

        async fn concat_and_mux(&self, request: &ConcatMux) -> BeatCutResult<()> {
            let list = tokio::fs::read_to_string(&request.list_file).await?;
            if let Ok(mut lists) = self.concat_lists.lock() {
                lists.push(list);
            }
            tokio::fs::write(&request.output, format!("{}", request.duration)).await?;
            Ok(())
        }

        async fn available_encoders(&self) -> BeatCutResult<Vec<String>> {
            Ok(vec!["libx264".to_string(), "h264_nvenc".to_string()])
        }
    }

    pub fn library(root: &Path, names: &[&str]) -> PathBuf {
        let lib = root.join("lib");
        std::fs::create_dir_all(lib.join("city")).unwrap();
        for name in names {
            std::fs::write(lib.join("city").join(format!("{}.mp4", name)), b"").unwrap();
        }
        lib
    }

    pub fn config(root: &Path, workers: usize) -> BeatCutConfig {
        let mut config = BeatCutConfig::default();
        config.pipeline.workers = workers;
        config.pipeline.work_dir = Some(root.join("work"));
        config
    }

    pub fn request(root: &Path, library: PathBuf) -> RenderRequest {
        RenderRequest {
            library,
            categories: vec!["city".to_string()],
            output: root.join("out").join("reel.mp4"),
            duration: Some(6.0),
            seed: Some(2024),
            ..RenderRequest::default()
        }
    }

    pub fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }
}

use test_utils::*;

#[tokio::test]
async fn test_successful_job_writes_video_and_manifest() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["a", "b", "c"]);
    let interactor = RenderInteractor::new(
        Arc::new(FakeProbe),
        Arc::new(FakeExec::default()),
        config(temp.path(), 3),
    );

    let artifact = interactor.render(&request(temp.path(), library)).await.unwrap();

    assert!(artifact.video_path.exists());
    let manifest = Manifest::load(&artifact.manifest_path).unwrap();
    let sum: f64 = manifest.segments.iter().map(|s| s.duration).sum();
    assert!((sum - manifest.total_duration).abs() < 1.0 / 30.0);
    assert!(manifest.segments.iter().all(|s| s.source_in < s.source_out));
    assert_eq!(entries(&temp.path().join("work")), 0);
}

#[tokio::test]
async fn test_vanished_clip_fails_with_segment_index_and_no_output() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["a", "b", "c"]);
    let request = request(temp.path(), library);
    let exec = FakeExec {
        vanished: ["b".to_string()].into_iter().collect(),
        ..FakeExec::default()
    };
    let interactor = RenderInteractor::new(Arc::new(FakeProbe), Arc::new(exec), config(temp.path(), 1));

    let planned = interactor.prepare(&request).await.unwrap();
    let expected = planned
        .plan
        .segments
        .iter()
        .position(|segment| segment.clip_id == "b")
        .expect("plan draws from every clip");

    let err = interactor.render(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.segment_index(), Some(expected));
    assert!(!request.output.exists());
    assert_eq!(entries(&temp.path().join("out")), 0);
    assert_eq!(entries(&temp.path().join("work")), 0);
}

#[tokio::test]
async fn test_substitute_once_replaces_vanished_clip() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["a", "b", "c", "d"]);
    let exec = FakeExec {
        vanished: ["b".to_string()].into_iter().collect(),
        ..FakeExec::default()
    };
    let mut config = config(temp.path(), 2);
    config.pipeline.failure_policy = FailurePolicy::SubstituteOnce;
    let interactor = RenderInteractor::new(Arc::new(FakeProbe), Arc::new(exec), config);

    let artifact = interactor.render(&request(temp.path(), library)).await.unwrap();

    let manifest = Manifest::load(&artifact.manifest_path).unwrap();
    assert!(manifest.segments.iter().all(|s| s.clip_id != "b"));
}

#[tokio::test]
async fn test_concat_follows_plan_order_not_completion_order() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["a", "b", "c"]);
    let exec = Arc::new(FakeExec {
        slow_first: true,
        ..FakeExec::default()
    });
    let interactor = RenderInteractor::new(Arc::new(FakeProbe), exec.clone(), config(temp.path(), 4));

    interactor.render(&request(temp.path(), library)).await.unwrap();

    let lists = exec.concat_lists.lock().unwrap();
    let names: Vec<String> = lists[0]
        .lines()
        .filter_map(|line| line.rsplit('/').next())
        .map(|name| name.trim_end_matches('\'').to_string())
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert!(names.len() > 1);
    assert_eq!(names, sorted);
    assert_eq!(names[0], "seg_0000.mp4");
}

#[tokio::test]
async fn test_single_clip_pool_flags_relaxed_repetition() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["only"]);
    let interactor = RenderInteractor::new(
        Arc::new(FakeProbe),
        Arc::new(FakeExec::default()),
        config(temp.path(), 2),
    );

    let artifact = interactor.render(&request(temp.path(), library)).await.unwrap();
    let manifest = Manifest::load(&artifact.manifest_path).unwrap();
    assert!(manifest.repetition_relaxed);
}

#[tokio::test]
async fn test_reassembly_from_kept_intermediates() {
    let temp = TempDir::new().unwrap();
    let library = library(temp.path(), &["a", "b", "c"]);
    let mut config = config(temp.path(), 2);
    config.pipeline.keep_intermediates = true;
    let interactor = RenderInteractor::new(Arc::new(FakeProbe), Arc::new(FakeExec::default()), config);

    let artifact = interactor.render(&request(temp.path(), library)).await.unwrap();
    let work = std::fs::read_dir(temp.path().join("work"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();

    let again = temp.path().join("again.mp4");
    let rebuilt = interactor
        .reassemble(&artifact.manifest_path, &work, None, &again)
        .await
        .unwrap();
    assert!(again.exists());
    assert!((rebuilt.duration - artifact.duration).abs() < 1e-9);
}
