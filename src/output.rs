//! Raw result documents and the run-summary CSV.
//!
//! Supports JSON result files per window and CSV append of run summaries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collect::{CollectSummary, ResultRecord, StopReason};
use crate::store::write_atomic;
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// `<raw_dir>/<period>_results.json`
pub fn results_path(raw_dir: &Path, period: &str) -> PathBuf {
    raw_dir.join(format!("{period}_results.json"))
}

/// Replaces the raw results document for one window.
pub fn write_results(path: &Path, records: &[ResultRecord]) -> Result<()> {
    let body = serde_json::to_vec_pretty(records)?;
    write_atomic(path, &body)?;
    info!(path = %path.display(), records = records.len(), "Raw results written");
    Ok(())
}

/// Loads the raw results of every listed window. Windows without a results
/// file are skipped with a warning.
pub fn load_results(raw_dir: &Path, periods: &[String]) -> Result<Vec<ResultRecord>> {
    let mut all = Vec::new();
    for period in periods {
        let path = results_path(raw_dir, period);
        if !path.exists() {
            warn!(path = %path.display(), "No results for period, skipping");
            continue;
        }
        let records: Vec<ResultRecord> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        info!(period, records = records.len(), "Loaded raw results");
        all.extend(records);
    }
    Ok(all)
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One row of the run log CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub period: String,
    pub total_pairs: usize,
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_reached: usize,
    pub stop_reason: StopReason,
}

impl From<&CollectSummary> for RunRecord {
    fn from(s: &CollectSummary) -> Self {
        Self {
            timestamp: Utc::now(),
            period: s.period.clone(),
            total_pairs: s.total_pairs,
            skipped: s.skipped,
            attempted: s.attempted,
            succeeded: s.succeeded,
            failed: s.failed,
            not_reached: s.not_reached,
            stop_reason: s.stop_reason,
        }
    }
}

/// Appends a [`RunRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &RunRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn run_record() -> RunRecord {
        RunRecord {
            timestamp: Utc::now(),
            period: "peak_am".into(),
            total_pairs: 10,
            skipped: 2,
            attempted: 8,
            succeeded: 7,
            failed: 1,
            not_reached: 0,
            stop_reason: StopReason::Exhausted,
        }
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("traffic_sampler_test_header.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &run_record()).unwrap();
        append_record(&path, &run_record()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("exhausted"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_results_are_skipped() {
        let dir = temp_path("traffic_sampler_test_no_results");
        let _ = fs::remove_dir_all(&dir);
        let loaded = load_results(&dir, &["peak_am".to_string()]).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_results_roundtrip_empty_document() {
        let dir = temp_path("traffic_sampler_test_results");
        write_results(&results_path(&dir, "off_peak"), &[]).unwrap();
        let loaded = load_results(&dir, &["off_peak".to_string()]).unwrap();
        assert!(loaded.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
