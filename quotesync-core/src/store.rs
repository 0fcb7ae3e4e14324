//! CSV artifact store — one file per symbol.
//!
//! Layout: `{data_dir}/{SYMBOL}.csv`, a header line followed by date-leading
//! rows in ascending order.
//!
//! Features:
//! - Size-based validity check (undersized files are stale error payloads,
//!   not data, and are deleted on sight)
//! - Trailing-row inspection to find the last known good date
//! - Atomic writes (write to .tmp, rename into place)
//! - Idempotent removal

use crate::merge;
use crate::source::SyncError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Artifacts smaller than this are error or empty payloads, not history.
pub const MIN_ARTIFACT_BYTES: u64 = 1000;

/// What the store knows about a symbol's artifact before a fetch.
///
/// Computed once per symbol before dispatch; the retry wrapper never
/// re-derives it between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// No artifact on disk — full fetch.
    Absent,
    /// Artifact was undersized or its trailing row was not a date; it has
    /// been deleted and the symbol downgraded to a full fetch.
    Corrupt,
    /// Artifact is trustworthy up to `last_date` — incremental fetch.
    Valid { last_date: NaiveDate },
}

/// How a fetched payload lands on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write the payload verbatim as a fresh artifact, framing included.
    Replace,
    /// Merge interior rows onto the existing artifact.
    Append,
}

/// One parsed artifact row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Adj Close")]
    pub adj_close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
}

/// The CSV artifact store.
pub struct CsvStore {
    data_dir: PathBuf,
    min_bytes: u64,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_min_bytes(data_dir, MIN_ARTIFACT_BYTES)
    }

    /// Store with a custom validity threshold (tests use small fixtures).
    pub fn with_min_bytes(data_dir: impl Into<PathBuf>, min_bytes: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            min_bytes,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the artifact for a symbol: `{data_dir}/{SYMBOL}.csv`.
    pub fn artifact_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.csv"))
    }

    pub fn exists(&self, symbol: &str) -> bool {
        self.artifact_path(symbol).exists()
    }

    /// Classify a symbol's artifact, self-healing on the way.
    ///
    /// Undersized artifacts and artifacts whose trailing row does not parse
    /// as a date (e.g. a saved JSON error body ending in `}`) are deleted so
    /// the next fetch is treated as a full fetch.
    pub fn state(&self, symbol: &str) -> io::Result<ArtifactState> {
        let path = self.artifact_path(symbol);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ArtifactState::Absent),
            Err(e) => return Err(e),
        };

        if meta.len() < self.min_bytes {
            fs::remove_file(&path)?;
            return Ok(ArtifactState::Corrupt);
        }

        let contents = fs::read_to_string(&path)?;
        let trailing = contents.lines().rev().find(|l| !l.trim().is_empty());
        match trailing.and_then(merge::leading_date) {
            Some(last_date) => Ok(ArtifactState::Valid { last_date }),
            None => {
                fs::remove_file(&path)?;
                Ok(ArtifactState::Corrupt)
            }
        }
    }

    /// Write a fetched payload for a symbol.
    ///
    /// Returns the number of data rows written (interior rows for `Replace`,
    /// appended rows for `Append`). A zero-row `Append` leaves the artifact
    /// untouched; a non-zero write goes to a temp file and is renamed into
    /// place, so the artifact never shrinks mid-write.
    pub fn write(&self, symbol: &str, payload: &str, mode: WriteMode) -> Result<usize, SyncError> {
        let path = self.artifact_path(symbol);
        match mode {
            WriteMode::Replace => {
                let rows = merge::interior_rows(payload).len();
                self.write_atomic(&path, payload)?;
                Ok(rows)
            }
            WriteMode::Append => {
                let existing = fs::read_to_string(&path)?;
                let merged = merge::merge(&existing, payload)?;
                if merged.rows_appended == 0 {
                    return Ok(0);
                }
                self.write_atomic(&path, &merged.contents)?;
                Ok(merged.rows_appended)
            }
        }
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
    }

    /// Delete a symbol's artifact. Missing files are not an error.
    pub fn remove(&self, symbol: &str) -> io::Result<()> {
        match fs::remove_file(self.artifact_path(symbol)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Parse a symbol's artifact into typed rows, sorted as stored.
    pub fn load(&self, symbol: &str) -> Result<Vec<DailyRow>, SyncError> {
        let path = self.artifact_path(symbol);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| SyncError::Store(format!("open {}: {e}", path.display())))?;

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: DailyRow = record.map_err(|e| SyncError::Store(format!("{symbol}: {e}")))?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Symbols that currently have an artifact on disk.
    pub fn list_symbols(&self) -> io::Result<Vec<String>> {
        let mut symbols = Vec::new();
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(symbols),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_data_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("quotesync_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const HEADER: &str = "Date,Open,High,Low,Close,Adj Close,Volume";

    fn sample_payload(dates: &[&str]) -> String {
        let rows: Vec<String> = dates
            .iter()
            .map(|d| format!("{d},10.0,11.0,9.0,10.5,10.5,12345"))
            .collect();
        format!("{HEADER}\n{}\n", rows.join("\n"))
    }

    #[test]
    fn absent_symbol() {
        let store = CsvStore::new(temp_data_dir());
        assert!(!store.exists("SPY"));
        assert_eq!(store.state("SPY").unwrap(), ArtifactState::Absent);
    }

    #[test]
    fn undersized_artifact_is_deleted() {
        let dir = temp_data_dir();
        let store = CsvStore::new(&dir);
        fs::write(store.artifact_path("SPY"), "tiny").unwrap();

        assert_eq!(store.state("SPY").unwrap(), ArtifactState::Corrupt);
        assert!(!store.exists("SPY"));
    }

    #[test]
    fn error_marker_tail_is_corrupt() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        let contents = format!("{HEADER}\n{{\"finance\":{{\"error\":\"bad\"}}}}\n");
        fs::write(store.artifact_path("SPY"), contents).unwrap();

        assert_eq!(store.state("SPY").unwrap(), ArtifactState::Corrupt);
        assert!(!store.exists("SPY"));
    }

    #[test]
    fn valid_artifact_reports_last_date() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        store
            .write("SPY", &sample_payload(&["2024-01-02", "2024-01-03"]), WriteMode::Replace)
            .unwrap();

        assert_eq!(
            store.state("SPY").unwrap(),
            ArtifactState::Valid {
                last_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
            }
        );
    }

    #[test]
    fn replace_writes_payload_verbatim() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        let payload = sample_payload(&["2024-01-02"]);
        let rows = store.write("SPY", &payload, WriteMode::Replace).unwrap();

        assert_eq!(rows, 1);
        assert_eq!(fs::read_to_string(store.artifact_path("SPY")).unwrap(), payload);
        assert!(!store.artifact_path("SPY").with_extension("csv.tmp").exists());
    }

    #[test]
    fn append_merges_new_rows() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        store
            .write("SPY", &sample_payload(&["2024-01-02"]), WriteMode::Replace)
            .unwrap();
        let rows = store
            .write("SPY", &sample_payload(&["2024-01-03"]), WriteMode::Append)
            .unwrap();

        assert_eq!(rows, 1);
        let loaded = store.load("SPY").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].date < loaded[1].date);
    }

    #[test]
    fn empty_append_is_noop() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        store
            .write("SPY", &sample_payload(&["2024-01-02"]), WriteMode::Replace)
            .unwrap();
        let before = fs::read_to_string(store.artifact_path("SPY")).unwrap();

        let rows = store
            .write("SPY", &format!("{HEADER}\n"), WriteMode::Append)
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(fs::read_to_string(store.artifact_path("SPY")).unwrap(), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = CsvStore::new(temp_data_dir());
        store.remove("GONE").unwrap();
        store.remove("GONE").unwrap();
    }

    #[test]
    fn load_parses_typed_rows() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        store
            .write("SPY", &sample_payload(&["2024-01-02"]), WriteMode::Replace)
            .unwrap();

        let rows = store.load("SPY").unwrap();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(rows[0].close, 10.5);
        assert_eq!(rows[0].volume, 12345);
    }

    #[test]
    fn list_symbols_ignores_non_csv() {
        let dir = temp_data_dir();
        let store = CsvStore::with_min_bytes(&dir, 10);
        store
            .write("SPY", &sample_payload(&["2024-01-02"]), WriteMode::Replace)
            .unwrap();
        store
            .write("QQQ", &sample_payload(&["2024-01-02"]), WriteMode::Replace)
            .unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list_symbols().unwrap(), vec!["QQQ", "SPY"]);
    }
}
