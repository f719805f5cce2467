//! Two-tier analysis cache: an in-memory layer over durable JSON files.
//!
//! Each entry is one `<id>.json` file carrying the payload plus the freshness
//! timestamp it was computed against. An entry is served only when its stored
//! freshness is at least the caller's `min_fresh` bound; stale, unreadable,
//! or malformed entries are misses. Writes go through a tempfile in the cache
//! directory and an atomic rename, so a concurrent reader never observes a
//! partially written entry.

use crate::error::{CompendiumError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A cached payload plus the source freshness it was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    /// Epoch seconds; the entry is valid while this is >= the newest source.
    pub freshness: f64,
}

/// A durable key-value cache for one analysis layer.
#[derive(Debug)]
pub struct AnalysisCache<T> {
    dir: PathBuf,
    memory: RwLock<HashMap<String, CacheEntry<T>>>,
}

fn file_stem(id: &str) -> String {
    // Entity ids may carry path separators (e.g. lineage strings).
    id.replace(['/', '\\'], "_")
}

impl<T> AnalysisCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            memory: RwLock::new(HashMap::new()),
        })
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id)))
    }

    /// Fetch an entry no staler than `min_fresh`, or a miss.
    ///
    /// Checks the in-memory layer first, then disk; a fresh disk entry is
    /// promoted into memory. Corrupt entries are logged and treated as
    /// misses, which forces recomputation.
    pub fn get(&self, id: &str, min_fresh: f64) -> Option<T> {
        {
            let memory = self.memory.read().expect("cache lock poisoned");
            if let Some(entry) = memory.get(id) {
                if entry.freshness >= min_fresh {
                    return Some(entry.payload.clone());
                }
            }
        }

        let entry = match self.read_disk(id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("treating cache entry '{id}' as a miss: {e}");
                return None;
            }
        };
        if entry.freshness < min_fresh {
            log::info!("cache entry '{id}' is stale, recomputing");
            return None;
        }

        let payload = entry.payload.clone();
        self.memory
            .write()
            .expect("cache lock poisoned")
            .insert(id.to_string(), entry);
        Some(payload)
    }

    /// Stored freshness of an entry, if one exists and is readable.
    pub fn freshness(&self, id: &str) -> Option<f64> {
        {
            let memory = self.memory.read().expect("cache lock poisoned");
            if let Some(entry) = memory.get(id) {
                return Some(entry.freshness);
            }
        }
        self.read_disk(id).ok().flatten().map(|e| e.freshness)
    }

    /// Store an entry durably, then publish it to the in-memory layer.
    ///
    /// The write is atomic: serialize to a tempfile in the cache directory,
    /// then rename over the destination.
    pub fn put(&self, id: &str, payload: T, freshness: f64) -> Result<()> {
        let entry = CacheEntry { payload, freshness };

        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, &entry)?;
            writer.flush()?;
        }
        tmp.persist(self.path(id))
            .map_err(|e| CompendiumError::Io(e.error))?;

        self.memory
            .write()
            .expect("cache lock poisoned")
            .insert(id.to_string(), entry);
        log::info!("cached entry '{id}'");
        Ok(())
    }

    /// Drop the in-memory layer. Disk entries remain and are re-judged by
    /// their freshness stamp on the next read.
    pub fn invalidate_all(&self) {
        self.memory.write().expect("cache lock poisoned").clear();
        log::info!("in-memory cache cleared");
    }

    fn read_disk(&self, id: &str) -> Result<Option<CacheEntry<T>>> {
        let path = self.path(id);
        if !path.exists() {
            return Ok(None);
        }
        let entry = parse_entry(&path)
            .map_err(|e| CompendiumError::CacheCorrupt(format!("{}: {e}", path.display())))?;
        Ok(Some(entry))
    }
}

fn parse_entry<T: DeserializeOwned>(path: &Path) -> Result<CacheEntry<T>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
