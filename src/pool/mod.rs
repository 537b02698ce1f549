//! Clip pool
//!
//! In-memory catalog of b-roll clips scanned from a library directory with one
//! subdirectory per category. Unreadable files are skipped with a warning.
//! Measured durations and motion scores are cached next to the library.

pub mod cache;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PoolSettings;
use crate::domain::model::Clip;
use crate::error::{BeatCutError, BeatCutResult};
use crate::ports::ProbePort;
use crate::utils::path::PathUtils;

use cache::{CachedClip, ClipCache, FileStamp};

/// Explicit pool construction options
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    pub extensions: Vec<String>,
    pub min_clip_duration: f64,
    pub exclusions: HashSet<String>,
    pub use_cache: bool,
    pub motion_analysis: bool,
}

impl PoolOptions {
    /// Options from configuration, reading the exclusion file if one is set
    pub fn from_settings(settings: &PoolSettings) -> BeatCutResult<Self> {
        let mut exclusions: HashSet<String> = settings.exclusions.iter().cloned().collect();
        if let Some(file) = &settings.exclusion_file {
            exclusions.extend(read_exclusion_file(file)?);
        }
        Ok(Self {
            extensions: settings.extensions.clone(),
            min_clip_duration: settings.min_clip_duration,
            exclusions,
            use_cache: settings.cache,
            motion_analysis: settings.motion_analysis,
        })
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from_settings(&PoolSettings::default()).unwrap_or_else(|_| Self {
            extensions: Vec::new(),
            min_clip_duration: 0.0,
            exclusions: HashSet::new(),
            use_cache: false,
            motion_analysis: false,
        })
    }
}

/// One identifier per line; blank lines and `#` comments ignored
pub fn read_exclusion_file(path: &Path) -> BeatCutResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BeatCutError::config(format!("cannot read exclusion file {}: {}", path.display(), e))
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Read-only clip catalog
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClipPool {
    clips: Vec<Clip>,
    categories: Vec<String>,
}

impl ClipPool {
    /// Build a pool from clips already in memory
    pub fn from_clips(clips: Vec<Clip>, categories: Vec<String>) -> Self {
        Self { clips, categories }
    }

    /// Scan `library_dir/<category>` for each category (all subdirectories when
    /// `categories` is empty). Clips come back in category order, then file-name order.
    pub async fn load(
        library_dir: &Path,
        categories: &[String],
        options: &PoolOptions,
        probe: &dyn ProbePort,
    ) -> BeatCutResult<Self> {
        if !library_dir.is_dir() {
            return Err(BeatCutError::EmptyClipPool {
                message: format!("library directory {} does not exist", library_dir.display()),
            });
        }

        let categories = if categories.is_empty() {
            discover_categories(library_dir)?
        } else {
            categories.to_vec()
        };

        let utils = PathUtils::new();
        let mut cache = options.use_cache.then(|| ClipCache::load(library_dir));
        let mut clips: Vec<Clip> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut skipped = 0usize;

        for category in &categories {
            let dir = library_dir.join(category);
            if !dir.is_dir() {
                warn!("Category directory missing, skipping: {}", dir.display());
                continue;
            }

            for path in media_files(&dir, &options.extensions) {
                let Some(id) = utils.media_id(&path) else {
                    continue;
                };
                if options.exclusions.contains(&id) {
                    debug!("Excluded clip {}", id);
                    continue;
                }
                if let Some(&existing) = by_id.get(&id) {
                    let merged = clips[existing].clone().with_category(category.as_str());
                    clips[existing] = merged;
                    continue;
                }

                let measured = match measure(&path, options, probe, cache.as_mut()).await {
                    Ok(measured) => measured,
                    Err(e) => {
                        warn!("Skipping unreadable clip {}: {}", path.display(), e);
                        skipped += 1;
                        continue;
                    }
                };
                let duration = measured.duration;
                if duration <= options.min_clip_duration {
                    debug!("Skipping {} ({:.2}s is too short)", path.display(), duration);
                    skipped += 1;
                    continue;
                }

                by_id.insert(id.clone(), clips.len());
                clips.push(
                    Clip::new(id, path, duration)
                        .with_motion(measured.motion.unwrap_or(0.0))
                        .with_category(category.as_str()),
                );
            }
        }

        if let Some(cache) = cache.as_mut() {
            cache.save();
        }

        info!(
            "Loaded {} clips from {} categories ({} skipped)",
            clips.len(),
            categories.len(),
            skipped
        );
        Ok(Self { clips, categories })
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    pub fn by_category(&self, category: &str) -> Vec<&Clip> {
        self.clips
            .iter()
            .filter(|clip| clip.has_category(category))
            .collect()
    }

    /// Copy of the pool with the given identifiers removed
    pub fn without(&self, ids: &HashSet<String>) -> ClipPool {
        ClipPool {
            clips: self
                .clips
                .iter()
                .filter(|clip| !ids.contains(&clip.id))
                .cloned()
                .collect(),
            categories: self.categories.clone(),
        }
    }
}

/// Duration and motion for one file, from the cache when its stamp still matches
async fn measure(
    path: &Path,
    options: &PoolOptions,
    probe: &dyn ProbePort,
    cache: Option<&mut ClipCache>,
) -> BeatCutResult<CachedClip> {
    let stamp = FileStamp::of(path);
    if let (Some(cache), Some(stamp)) = (cache.as_deref(), stamp) {
        if let Some(hit) = cache.lookup(path, stamp) {
            if !options.motion_analysis {
                return Ok(CachedClip {
                    motion: None,
                    ..hit.clone()
                });
            }
            if hit.motion.is_some() {
                return Ok(hit.clone());
            }
        }
    }

    let duration = probe.probe_duration(path).await?;
    let motion = if options.motion_analysis {
        Some(probe.motion_score(path).await?.clamp(0.0, 1.0))
    } else {
        None
    };

    let measured = CachedClip {
        duration,
        motion,
        stamp: stamp.unwrap_or_default(),
    };
    if let (Some(cache), Some(_)) = (cache, stamp) {
        cache.insert(path, measured.clone());
    }
    Ok(measured)
}

fn discover_categories(library_dir: &Path) -> BeatCutResult<Vec<String>> {
    let mut categories: Vec<String> = std::fs::read_dir(library_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    categories.sort();
    Ok(categories)
}

fn media_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let utils = PathUtils::new();
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cannot read library entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| utils.has_extension(path, extensions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Durations keyed by file stem; "corrupt" files fail to probe
    struct StemProbe;

    #[async_trait]
    impl ProbePort for StemProbe {
        async fn probe_duration(&self, path: &Path) -> BeatCutResult<f64> {
            let stem = PathUtils::new().media_id(path).unwrap_or_default();
            if stem.starts_with("corrupt") {
                return Err(BeatCutError::ProbeFailed {
                    path: path.display().to_string(),
                    message: "invalid data".to_string(),
                });
            }
            if stem.starts_with("tiny") {
                return Ok(0.3);
            }
            Ok(4.0)
        }

        async fn decode_audio(&self, _: &Path, _: u32, _: f64) -> BeatCutResult<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    /// Counts every measurement; "busy" clips score high motion
    #[derive(Default)]
    struct CountingProbe {
        durations: AtomicUsize,
        motions: AtomicUsize,
    }

    #[async_trait]
    impl ProbePort for CountingProbe {
        async fn probe_duration(&self, _: &Path) -> BeatCutResult<f64> {
            self.durations.fetch_add(1, Ordering::SeqCst);
            Ok(4.0)
        }

        async fn decode_audio(&self, _: &Path, _: u32, _: f64) -> BeatCutResult<Vec<f32>> {
            Ok(Vec::new())
        }

        async fn motion_score(&self, path: &Path) -> BeatCutResult<f64> {
            self.motions.fetch_add(1, Ordering::SeqCst);
            let stem = PathUtils::new().media_id(path).unwrap_or_default();
            Ok(if stem.starts_with("busy") { 0.8 } else { 0.1 })
        }
    }

    fn library(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn loads_in_stable_order_and_fails_open() {
        let dir = library(&[
            "city/b_street.mp4",
            "city/a_lights.mov",
            "city/corrupt_one.mp4",
            "city/notes.txt",
            "city/tiny_clip.mp4",
            "nature/river.mp4",
        ]);
        let categories = vec!["nature".to_string(), "city".to_string()];
        let pool = ClipPool::load(dir.path(), &categories, &PoolOptions::default(), &StemProbe)
            .await
            .unwrap();

        let ids: Vec<&str> = pool.clips().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["river", "a_lights", "b_street"]);
        assert_eq!(pool.by_category("city").len(), 2);
    }

    #[tokio::test]
    async fn exclusions_are_skipped() {
        let dir = library(&["city/a.mp4", "city/b.mp4"]);
        let mut options = PoolOptions::default();
        options.exclusions.insert("a".to_string());
        let pool = ClipPool::load(dir.path(), &["city".to_string()], &options, &StemProbe)
            .await
            .unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.get("a").is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_merge_categories() {
        let dir = library(&["city/shared.mp4", "night/shared.mp4"]);
        let pool = ClipPool::load(dir.path(), &[], &PoolOptions::default(), &StemProbe)
            .await
            .unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.categories(), &["city".to_string(), "night".to_string()]);
        let clip = pool.get("shared").unwrap();
        assert!(clip.has_category("city") && clip.has_category("night"));
    }

    #[tokio::test]
    async fn missing_library_is_empty_pool_error() {
        let err = ClipPool::load(
            Path::new("/no/such/library"),
            &[],
            &PoolOptions::default(),
            &StemProbe,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BeatCutError::EmptyClipPool { .. }));
    }

    #[test]
    fn exclusion_file_ignores_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("denylist.txt");
        std::fs::write(&path, "# banned\nclip_a\n\n  clip_b  \n").unwrap();
        assert_eq!(read_exclusion_file(&path).unwrap(), vec!["clip_a", "clip_b"]);
    }

    #[test]
    fn without_removes_ids() {
        let pool = ClipPool::from_clips(
            vec![Clip::new("a", "/a.mp4", 3.0), Clip::new("b", "/b.mp4", 3.0)],
            vec![],
        );
        let ids: HashSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(pool.without(&ids).len(), 1);
    }

    #[tokio::test]
    async fn motion_is_measured_per_clip() {
        let dir = library(&["city/busy_traffic.mp4", "city/calm_lake.mp4"]);
        let probe = CountingProbe::default();
        let pool = ClipPool::load(dir.path(), &[], &PoolOptions::default(), &probe)
            .await
            .unwrap();
        assert_eq!(pool.get("busy_traffic").unwrap().motion, 0.8);
        assert_eq!(pool.get("calm_lake").unwrap().motion, 0.1);
    }

    #[tokio::test]
    async fn cached_clips_are_not_measured_again() {
        let dir = library(&["city/a.mp4", "city/busy_b.mp4"]);
        let options = PoolOptions::default();

        let first = CountingProbe::default();
        ClipPool::load(dir.path(), &[], &options, &first).await.unwrap();
        assert_eq!(first.durations.load(Ordering::SeqCst), 2);
        assert!(dir.path().join(cache::CACHE_FILE_NAME).is_file());

        let second = CountingProbe::default();
        let pool = ClipPool::load(dir.path(), &[], &options, &second)
            .await
            .unwrap();
        assert_eq!(second.durations.load(Ordering::SeqCst), 0);
        assert_eq!(second.motions.load(Ordering::SeqCst), 0);
        assert_eq!(pool.get("busy_b").unwrap().motion, 0.8);
    }

    #[tokio::test]
    async fn changed_clip_is_measured_again() {
        let dir = library(&["city/a.mp4", "city/b.mp4"]);
        let options = PoolOptions::default();
        ClipPool::load(dir.path(), &[], &options, &CountingProbe::default())
            .await
            .unwrap();

        std::fs::write(dir.path().join("city/b.mp4"), b"re-exported").unwrap();
        let probe = CountingProbe::default();
        ClipPool::load(dir.path(), &[], &options, &probe).await.unwrap();
        assert_eq!(probe.durations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_and_motion() {
        let dir = library(&["city/busy_a.mp4"]);
        let mut options = PoolOptions::default();
        options.use_cache = false;
        options.motion_analysis = false;
        let probe = CountingProbe::default();
        let pool = ClipPool::load(dir.path(), &[], &options, &probe).await.unwrap();
        assert_eq!(probe.motions.load(Ordering::SeqCst), 0);
        assert_eq!(pool.get("busy_a").unwrap().motion, 0.0);
        assert!(!dir.path().join(cache::CACHE_FILE_NAME).exists());
    }
}
