//! Local fallback cache implementations.
//!
//! The cache holds the whole entry collection as one JSON blob under a fixed
//! key. It is the durability floor when the primary store is unreachable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::warn;

use crate::error::{LogError, Result};
use crate::traits::LocalCache;
use crate::types::LogEntry;

/// Default key of the cache blob.
pub const DEFAULT_CACHE_KEY: &str = "debug_logs";

/// Writes `bytes` to `path` through a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Cache stored as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    /// Creates a cache for `key` inside `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Returns the blob path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCache for JsonFileCache {
    fn load(&self) -> Result<Vec<LogEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LogError::PersistenceRead {
                    tier: "cache",
                    reason: e.to_string(),
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            warn!(target: "devlog", path = %self.path.display(), error = %e, "local cache is corrupt");
            LogError::PersistenceRead {
                tier: "cache",
                reason: e.to_string(),
            }
        })
    }

    fn store(&self, entries: &[LogEntry]) -> Result<()> {
        let json = serde_json::to_vec(entries)?;
        write_atomic(&self.path, &json).map_err(|e| LogError::PersistenceWrite {
            tier: "cache",
            reason: e.to_string(),
        })
    }
}

/// Cache held in memory; survives only as long as the value.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-filled with `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Result<Vec<LogEntry>> {
        Ok(self.entries.read().clone())
    }

    fn store(&self, entries: &[LogEntry]) -> Result<()> {
        *self.entries.write() = entries.to_vec();
        Ok(())
    }
}
