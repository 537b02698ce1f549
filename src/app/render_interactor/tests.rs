use super::*;
use crate::ports::{ConcatMux, SegmentEncode};
use async_trait::async_trait;

/// Clips probe at 8 s; assembled outputs report the duration written into them
struct FakeProbe;

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

struct FakeExec;

#[async_trait]
impl ExecutePort for FakeExec {
    async fn encode_segment(&self, request: &SegmentEncode) -> BeatCutResult<()> {
        tokio::fs::write(&request.output, b"frames").await?;
        Ok(())
    }

    async fn concat_and_mux(&self, request: &ConcatMux) -> BeatCutResult<()> {
        tokio::fs::write(&request.output, format!("{}", request.duration)).await?;
        Ok(())
    }

    async fn available_encoders(&self) -> BeatCutResult<Vec<String>> {
        Ok(vec!["libx264".to_string()])
    }
}

fn library(root: &Path) -> PathBuf {
    let lib = root.join("lib");
    for (category, names) in [("city", ["lights", "street"]), ("sea", ["wave", "shore"])] {
        std::fs::create_dir_all(lib.join(category)).unwrap();
        for name in names {
            std::fs::write(lib.join(category).join(format!("{}.mp4", name)), b"").unwrap();
        }
    }
    lib
}

fn interactor(root: &Path) -> RenderInteractor {
    let mut config = BeatCutConfig::default();
    config.pipeline.workers = 2;
    config.pipeline.work_dir = Some(root.join("work"));
    RenderInteractor::new(Arc::new(FakeProbe), Arc::new(FakeExec), config)
}

fn request(root: &Path) -> RenderRequest {
    RenderRequest {
        library: library(root),
        categories: vec!["city".to_string(), "sea".to_string()],
        output: root.join("out").join("reel.mp4"),
        duration: Some(6.0),
        seed: Some(11),
        ..RenderRequest::default()
    }
}

#[test]
fn derived_seed_is_stable() {
    let a = RenderRequest {
        library: PathBuf::from("/lib"),
        categories: vec!["city".to_string()],
        ..RenderRequest::default()
    };
    let b = a.clone();
    assert_eq!(a.effective_seed(), b.effective_seed());

    let c = RenderRequest {
        categories: vec!["sea".to_string()],
        ..a.clone()
    };
    assert_ne!(a.effective_seed(), c.effective_seed());
    assert_eq!(RenderRequest { seed: Some(5), ..a }.effective_seed(), 5);
}

#[tokio::test]
async fn prepare_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let interactor = interactor(dir.path());
    let request = request(dir.path());

    let first = interactor.prepare(&request).await.unwrap();
    let second = interactor.prepare(&request).await.unwrap();
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.track.id, "synthetic");
    assert!(first.plan.loop_eligible);
    assert!((first.plan.total_duration - 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn lyrics_move_audio_to_snapped_beat() {
    let dir = tempfile::tempdir().unwrap();
    let lrc = dir.path().join("song.lrc");
    std::fs::write(&lrc, "[00:03.20]first line\n[00:05.00]second line\n").unwrap();

    let interactor = interactor(dir.path());
    let request = RenderRequest {
        lyrics: Some(lrc),
        lyric_start: Some(3.2),
        ..request(dir.path())
    };
    let prepared = interactor.prepare(&request).await.unwrap();

    assert_eq!(prepared.audio_offset, 3.0);
    assert_eq!(prepared.lyrics.len(), 2);
    assert!(prepared.lyrics[0].start.abs() < 1e-9);
    assert!((prepared.lyrics[1].start - 1.8).abs() < 1e-9);
}

#[tokio::test]
async fn empty_lyric_window_renders_without_captions() {
    let dir = tempfile::tempdir().unwrap();
    let lrc = dir.path().join("song.lrc");
    std::fs::write(&lrc, "[00:03.20]only line\n").unwrap();

    let interactor = interactor(dir.path());
    let request = RenderRequest {
        lyrics: Some(lrc),
        lyric_start: Some(40.0),
        ..request(dir.path())
    };
    let prepared = interactor.prepare(&request).await.unwrap();
    assert!(prepared.lyrics.is_empty());
    assert_eq!(prepared.audio_offset, prepared.track.start_offset);
}

#[tokio::test]
async fn render_publishes_video_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let interactor = interactor(dir.path());
    let request = request(dir.path());

    let artifact = interactor.render(&request).await.unwrap();
    assert!(artifact.video_path.exists());
    assert_eq!(artifact.manifest_path, dir.path().join("out").join("reel.manifest.json"));
    assert!((artifact.duration - 6.0).abs() < 1e-6);

    let manifest = crate::output::Manifest::load(&artifact.manifest_path).unwrap();
    assert_eq!(manifest.seed, 11);
    assert!(manifest.loop_eligible);

    // Work directory removed after the job
    let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn missing_library_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let interactor = interactor(dir.path());
    let request = RenderRequest {
        library: dir.path().join("nowhere"),
        ..request(dir.path())
    };
    let err = interactor.render(&request).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Input);
    assert!(!dir.path().join("out").join("reel.mp4").exists());
}
