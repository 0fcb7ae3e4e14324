//! Durable per-pass outcome logs.
//!
//! A pass owns two newline-delimited symbol lists derived from the registry
//! path: `{stem}_completed_list.txt` and `{stem}_failed_list.txt`. Both are
//! truncated when the pass begins and only ever appended afterwards. The
//! two files are shared by every worker in the pass, so each append goes
//! through a mutex-guarded handle to keep lines intact.

use crate::resolve::Outcome;
use crate::source::SyncError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct Ledger {
    completed: Mutex<File>,
    failed: Mutex<File>,
}

fn sibling(registry: &Path, suffix: &str) -> PathBuf {
    let stem = registry
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    registry.with_file_name(format!("{stem}{suffix}"))
}

impl Ledger {
    pub fn completed_path(registry: &Path) -> PathBuf {
        sibling(registry, "_completed_list.txt")
    }

    pub fn failed_path(registry: &Path) -> PathBuf {
        sibling(registry, "_failed_list.txt")
    }

    /// Start a pass: truncate (or create) both logs.
    pub fn begin(registry: &Path) -> Result<Self, SyncError> {
        let open = |path: PathBuf| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| SyncError::Ledger(format!("open {}: {e}", path.display())))
        };
        Ok(Self {
            completed: Mutex::new(open(Self::completed_path(registry))?),
            failed: Mutex::new(open(Self::failed_path(registry))?),
        })
    }

    /// Append one symbol to the log matching its outcome.
    pub fn record(&self, symbol: &str, outcome: &Outcome) -> Result<(), SyncError> {
        let handle = if outcome.is_success() {
            &self.completed
        } else {
            &self.failed
        };
        let mut file = handle
            .lock()
            .map_err(|_| SyncError::Ledger("ledger mutex poisoned".into()))?;
        writeln!(file, "{symbol}").map_err(|e| SyncError::Ledger(format!("append: {e}")))?;
        file.flush()
            .map_err(|e| SyncError::Ledger(format!("flush: {e}")))
    }

    /// Symbols recorded as failed, for the reconciliation pass.
    pub fn read_failed(registry: &Path) -> Result<Vec<String>, SyncError> {
        let path = Self::failed_path(registry);
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| SyncError::Ledger(format!("read {}: {e}", path.display())))?;
        Ok(contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_registry() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("quotesync_ledger_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let registry = dir.join("tickers.txt");
        fs::write(&registry, "SPY\nQQQ\n").unwrap();
        registry
    }

    fn success() -> Outcome {
        Outcome::Success { rows_written: 1 }
    }

    fn failure() -> Outcome {
        Outcome::Failed {
            reason: "transport error: reset".into(),
        }
    }

    #[test]
    fn paths_derive_from_registry_stem() {
        let registry = Path::new("/tmp/tickers.txt");
        assert!(Ledger::completed_path(registry).ends_with("tickers_completed_list.txt"));
        assert!(Ledger::failed_path(registry).ends_with("tickers_failed_list.txt"));
    }

    #[test]
    fn begin_truncates_previous_run() {
        let registry = temp_registry();
        {
            let ledger = Ledger::begin(&registry).unwrap();
            ledger.record("SPY", &failure()).unwrap();
        }
        assert_eq!(Ledger::read_failed(&registry).unwrap(), vec!["SPY"]);

        let _ledger = Ledger::begin(&registry).unwrap();
        assert!(Ledger::read_failed(&registry).unwrap().is_empty());
    }

    #[test]
    fn record_routes_by_outcome() {
        let registry = temp_registry();
        let ledger = Ledger::begin(&registry).unwrap();
        ledger.record("SPY", &success()).unwrap();
        ledger.record("QQQ", &failure()).unwrap();

        let completed = fs::read_to_string(Ledger::completed_path(&registry)).unwrap();
        assert_eq!(completed, "SPY\n");
        assert_eq!(Ledger::read_failed(&registry).unwrap(), vec!["QQQ"]);
    }

    #[test]
    fn concurrent_appends_keep_lines_intact() {
        let registry = temp_registry();
        let ledger = Arc::new(Ledger::begin(&registry).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        ledger.record(&format!("SYM{i}_{j}"), &success()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let completed = fs::read_to_string(Ledger::completed_path(&registry)).unwrap();
        let lines: Vec<&str> = completed.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|l| l.starts_with("SYM")));
    }
}
