//! QuoteSync Core — incremental mirror of per-symbol daily quote history.
//!
//! The pipeline, per symbol: classify the local artifact (absent, corrupt,
//! or valid up to a date), derive a fetch window from that state exactly
//! once, fetch with a bounded retry loop, merge new rows onto the local
//! artifact without duplication, and record the terminal outcome in a
//! durable ledger. The orchestrator fans this pipeline across a bounded
//! worker pool and can re-drive the recorded failures in a single
//! reconciliation pass.

pub mod config;
pub mod ledger;
pub mod merge;
pub mod orchestrate;
pub mod registry;
pub mod resolve;
pub mod source;
pub mod store;
pub mod yahoo;

pub use config::SyncConfig;
pub use ledger::Ledger;
pub use orchestrate::{add_symbols, remove_symbols, sync, PassSummary, SyncOptions, SyncReport};
pub use resolve::{resolve, Outcome, RetryPolicy};
pub use source::{FetchWindow, QuoteSource, SilentProgress, StdoutProgress, SyncError, SyncProgress};
pub use store::{ArtifactState, CsvStore, DailyRow, WriteMode, MIN_ARTIFACT_BYTES};
pub use yahoo::YahooSource;
