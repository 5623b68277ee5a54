//! Narrow key-value persistence used by the geocode cache and checkpoints.
//!
//! Callers only `get`, `put` and `flush`; nothing is durable until `flush`.
//! [`MemoryStore`] backs tests, [`JsonFileStore`] keeps one JSON object on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Result;

pub trait KeyValueStore<V> {
    fn get(&self, key: &str) -> Option<V>;
    fn put(&mut self, key: &str, value: V);
    fn flush(&mut self) -> Result<()>;
}

/// In-memory store. `flushes` counts calls to [`KeyValueStore::flush`].
#[derive(Debug, Default)]
pub struct MemoryStore<V> {
    pub entries: HashMap<String, V>,
    pub flushes: usize,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            flushes: 0,
        }
    }
}

impl<V: Clone> KeyValueStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// A JSON object on disk, loaded once on open and rewritten on flush.
pub struct JsonFileStore<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
    dirty: bool,
}

impl<V: Serialize + DeserializeOwned + Clone> JsonFileStore<V> {
    /// Opens `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened JSON store");
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Serialize + DeserializeOwned + Clone> KeyValueStore<V> for JsonFileStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let body = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &body)?;
        self.dirty = false;
        Ok(())
    }
}

/// Replaces `path` with `bytes` so a reader sees either the old or the new
/// content, never a partial write.
///
/// Writes a sibling temporary file, syncs it, then renames over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
