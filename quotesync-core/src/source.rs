//! Quote source trait and structured error types.
//!
//! The QuoteSource trait abstracts over the remote quote service so the
//! retry/merge pipeline can be exercised against a mock in tests. A source
//! issues exactly one request per call; retry policy lives upstream in
//! [`crate::resolve`].

use chrono::NaiveDate;
use thiserror::Error;

/// Half-open fetch interval `[start, end)` in epoch seconds.
///
/// `start == 0` is the full-history sentinel: the remote service treats it
/// as "everything since epoch", which doubles as "no local data yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: i64,
    pub end: i64,
}

impl FetchWindow {
    /// Full history up to `end`.
    pub fn full(end: i64) -> Self {
        Self { start: 0, end }
    }

    /// Incremental window starting at the last known good row's date.
    pub fn since(last: NaiveDate, end: i64) -> Self {
        let start = last
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
            .timestamp();
        Self { start, end }
    }

    pub fn is_full_history(&self) -> bool {
        self.start == 0
    }
}

/// Structured error types for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from remote")]
    Status { status: u16 },

    #[error("error payload despite success status")]
    ErrorPayload,

    #[error("corrupt artifact for '{symbol}': trailing row is not a date")]
    CorruptArtifact { symbol: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether another attempt within the same window could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Status { .. } | SyncError::ErrorPayload
        )
    }
}

/// Trait for remote quote sources.
///
/// Implementations perform a single bounded request and report transport or
/// status failures; they never retry and never inspect the payload body.
/// Error-shaped bodies behind a 200 are the caller's concern.
pub trait QuoteSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the raw CSV payload for a symbol over a window.
    fn fetch(&self, symbol: &str, window: FetchWindow) -> Result<String, SyncError>;
}

/// Progress callback for multi-symbol passes.
pub trait SyncProgress: Send + Sync {
    /// Called when a worker starts resolving a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol reaches a terminal outcome.
    fn on_outcome(&self, symbol: &str, outcome: &crate::resolve::Outcome);

    /// Called when a full pass is done.
    fn on_pass_complete(&self, completed: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl SyncProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_outcome(&self, symbol: &str, outcome: &crate::resolve::Outcome) {
        match outcome {
            crate::resolve::Outcome::Success { rows_written } => {
                println!("  OK: {symbol} ({rows_written} rows)");
            }
            crate::resolve::Outcome::Failed { reason } => {
                println!("  FAIL: {symbol}: {reason}");
            }
        }
    }

    fn on_pass_complete(&self, completed: usize, failed: usize, total: usize) {
        println!("\nPass complete: {completed}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that prints nothing (for `--quiet` and tests).
pub struct SilentProgress;

impl SyncProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_outcome(&self, _symbol: &str, _outcome: &crate::resolve::Outcome) {}
    fn on_pass_complete(&self, _completed: usize, _failed: usize, _total: usize) {}
}
