//! Persisted progress of one window's collection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ResultRecord;
use crate::error::Result;
use crate::store::JsonFileStore;

/// Indices of completed pairs and every record collected so far.
///
/// `results` only ever grows; a record is never rewritten once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub completed: BTreeSet<usize>,
    pub results: Vec<ResultRecord>,
}

impl Checkpoint {
    pub fn is_complete(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn record(&mut self, index: usize, record: ResultRecord) {
        self.completed.insert(index);
        self.results.push(record);
    }
}

/// `<raw_dir>/<period>_progress.json`
pub fn checkpoint_path(raw_dir: &Path, period: &str) -> PathBuf {
    raw_dir.join(format!("{period}_progress.json"))
}

pub fn open_checkpoint_store(raw_dir: &Path, period: &str) -> Result<JsonFileStore<Checkpoint>> {
    JsonFileStore::open(checkpoint_path(raw_dir, period))
}
