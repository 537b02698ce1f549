//! Clip metadata cache
//!
//! Durations and motion scores are stored in a JSON file at the library root,
//! keyed by clip path. An entry is reused only while the file's size and
//! modification time are unchanged.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cache file name inside the library directory
pub const CACHE_FILE_NAME: &str = ".beatcut-cache.json";

const CACHE_VERSION: u32 = 1;

/// Identity of a file on disk at measurement time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub size: u64,
    pub mtime_ns: u64,
}

impl FileStamp {
    pub fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        let since_epoch = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
        let mtime_ns = u64::try_from(since_epoch.as_nanos()).ok()?;
        Some(Self {
            size: meta.len(),
            mtime_ns,
        })
    }
}

/// Measured clip metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedClip {
    pub duration: f64,
    /// Absent when motion analysis was off at measurement time
    #[serde(default)]
    pub motion: Option<f64>,
    pub stamp: FileStamp,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    clips: BTreeMap<String, CachedClip>,
}

/// Loaded cache plus a dirty flag
#[derive(Debug)]
pub struct ClipCache {
    path: PathBuf,
    entries: BTreeMap<String, CachedClip>,
    dirty: bool,
}

impl ClipCache {
    /// Load the cache for `library_dir`. A missing, unreadable or outdated file
    /// starts an empty cache.
    pub fn load(library_dir: &Path) -> Self {
        let path = library_dir.join(CACHE_FILE_NAME);
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) if file.version == CACHE_VERSION => file.clips,
                Ok(file) => {
                    debug!("Ignoring clip cache version {}", file.version);
                    BTreeMap::new()
                }
                Err(e) => {
                    warn!("Ignoring unreadable clip cache {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `clip` if it was measured from the same file contents
    pub fn lookup(&self, clip: &Path, stamp: FileStamp) -> Option<&CachedClip> {
        self.entries
            .get(&key(clip))
            .filter(|entry| entry.stamp == stamp)
    }

    pub fn insert(&mut self, clip: &Path, entry: CachedClip) {
        self.entries.insert(key(clip), entry);
        self.dirty = true;
    }

    /// Write back if anything changed. Failure only costs re-measuring next time.
    pub fn save(&mut self) {
        if !self.dirty {
            return;
        }
        let file = CacheFile {
            version: CACHE_VERSION,
            clips: std::mem::take(&mut self.entries),
        };
        let result = self.write(&file);
        self.entries = file.clips;
        match result {
            Ok(()) => {
                self.dirty = false;
                debug!("Saved {} cached clips to {}", self.entries.len(), self.path.display());
            }
            Err(e) => warn!("Cannot save clip cache {}: {}", self.path.display(), e),
        }
    }

    fn write(&self, file: &CacheFile) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(file)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".beatcut-cache-")
            .tempfile_in(dir)?;
        staged.write_all(&json)?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(stamp: FileStamp) -> CachedClip {
        CachedClip {
            duration: 4.0,
            motion: Some(0.2),
            stamp,
        }
    }

    #[test]
    fn saved_entries_reload() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        std::fs::write(&clip, b"x").unwrap();
        let stamp = FileStamp::of(&clip).unwrap();

        let mut cache = ClipCache::load(dir.path());
        assert!(cache.is_empty());
        cache.insert(&clip, entry(stamp));
        cache.save();

        let reloaded = ClipCache::load(dir.path());
        assert_eq!(reloaded.lookup(&clip, stamp), Some(&entry(stamp)));
    }

    #[test]
    fn changed_file_misses() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("a.mp4");
        let stamp = FileStamp {
            size: 1,
            mtime_ns: 10,
        };
        let mut cache = ClipCache::load(dir.path());
        cache.insert(&clip, entry(stamp));

        let grown = FileStamp { size: 2, ..stamp };
        assert!(cache.lookup(&clip, grown).is_none());
        assert!(cache.lookup(&clip, stamp).is_some());
    }

    #[test]
    fn corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE_NAME), b"{ not json").unwrap();
        assert!(ClipCache::load(dir.path()).is_empty());
    }

    #[test]
    fn unwritable_cache_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the cache file should go blocks the rename
        std::fs::create_dir_all(dir.path().join(CACHE_FILE_NAME).join("inner")).unwrap();
        let mut cache = ClipCache::load(dir.path());
        let clip = dir.path().join("a.mp4");
        cache.insert(
            &clip,
            entry(FileStamp {
                size: 1,
                mtime_ns: 1,
            }),
        );
        cache.save();
        assert_eq!(cache.len(), 1);
    }
}
