// File: src/archive.rs
use crate::core::types::{Batch, WindowKey};
use crate::error::{Result, SlangError};
use crate::persistence::{load_json, save_json};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The rolling on-disk window of recent batches, one `<key>.json` per window.
/// Files that do not parse as a window key are ignored.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &WindowKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Archived window keys, oldest first. A missing directory is an empty archive.
    pub fn keys(&self) -> Result<Vec<WindowKey>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SlangError::storage(&self.dir, e)),
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SlangError::storage(&self.dir, e))?;
            let name = entry.file_name();
            let key = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(WindowKey::parse);
            match key {
                Some(key) => keys.push(key),
                None => debug!(file = ?name, "ignoring non-archive file"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn store(&self, batch: &Batch) -> Result<()> {
        save_json(batch, &self.path_for(&batch.key()))
    }

    pub fn load(&self, key: &WindowKey) -> Result<Batch> {
        load_json(&self.path_for(key))
    }

    /// Every archived batch, oldest first.
    pub fn load_all(&self) -> Result<Vec<Batch>> {
        self.keys()?.iter().map(|key| self.load(key)).collect()
    }

    /// Deletes one window. Returns `false` when it was already gone.
    pub fn evict(&self, key: &WindowKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(window = %key, "nothing to evict");
                Ok(false)
            }
            Err(e) => Err(SlangError::storage(path, e)),
        }
    }

    /// Evicts every window at or before `cutoff`, then the oldest windows until
    /// at most `capacity` remain. Returns the evicted keys, oldest first.
    pub fn evict_expired(&self, cutoff: &WindowKey, capacity: usize) -> Result<Vec<WindowKey>> {
        let keys = self.keys()?;
        let expired = keys.iter().take_while(|key| *key <= cutoff).count();
        let overflow = keys.len().saturating_sub(capacity);

        let mut evicted = Vec::new();
        for key in keys.iter().take(expired.max(overflow)) {
            if self.evict(key)? {
                evicted.push(*key);
            }
        }
        if overflow > expired {
            warn!(
                extra = overflow - expired,
                "archive over capacity without expired windows; evicted oldest"
            );
        }
        Ok(evicted)
    }
}
