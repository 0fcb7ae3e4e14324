//! Two-pass orchestration over the symbol registry.
//!
//! The primary pass fans the registry across a bounded worker pool, one
//! task per symbol, recording every outcome in the ledger. The optional
//! reconciliation pass re-drives exactly the symbols the failed log names,
//! after deleting whatever partial artifacts the failures left behind. The
//! reconciliation pass never recurses.

use crate::ledger::Ledger;
use crate::registry;
use crate::resolve::{resolve, Outcome, RetryPolicy};
use crate::source::{QuoteSource, SyncError, SyncProgress};
use crate::store::CsvStore;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Knobs for a full sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Worker pool size; `0` means available parallelism, `1` forces
    /// strictly sequential execution.
    pub workers: usize,
    /// Run the reconciliation pass over the failed log.
    pub reconcile: bool,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            reconcile: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of one orchestration pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub completed: Vec<String>,
    /// Failed symbols with their terminal failure reason.
    pub failed: Vec<(String, String)>,
}

impl PassSummary {
    fn from_outcomes(outcomes: Vec<(String, Outcome)>) -> Self {
        let mut summary = Self::default();
        for (symbol, outcome) in outcomes {
            match outcome {
                Outcome::Success { .. } => summary.completed.push(symbol),
                Outcome::Failed { reason } => summary.failed.push((symbol, reason)),
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Combined report over both passes.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub primary: PassSummary,
    pub reconciliation: Option<PassSummary>,
}

impl SyncReport {
    /// Symbols still failed after the last pass that saw them.
    pub fn final_failures(&self) -> &[(String, String)] {
        match &self.reconciliation {
            Some(pass) => &pass.failed,
            None => &self.primary.failed,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.final_failures().is_empty()
    }
}

fn effective_workers(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    }
}

/// Run one pass over a symbol set, recording every outcome in the ledger.
///
/// Exactly one ledger entry per symbol: the append happens on the worker
/// that resolved the symbol, serialized inside the ledger.
fn run_pass(
    source: &dyn QuoteSource,
    store: &CsvStore,
    ledger: &Ledger,
    symbols: &[String],
    workers: usize,
    retry: &RetryPolicy,
    progress: &dyn SyncProgress,
) -> Result<PassSummary, SyncError> {
    let total = symbols.len();
    let task = |(index, symbol): (usize, &String)| {
        progress.on_start(symbol, index, total);
        let outcome = resolve(source, store, symbol, retry);
        if let Err(e) = ledger.record(symbol, &outcome) {
            eprintln!("WARNING: ledger append for {symbol} failed: {e}");
        }
        progress.on_outcome(symbol, &outcome);
        (symbol.clone(), outcome)
    };

    let outcomes: Vec<(String, Outcome)> = if workers <= 1 {
        symbols.iter().enumerate().map(task).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| SyncError::Store(format!("worker pool: {e}")))?;
        pool.install(|| symbols.par_iter().enumerate().map(task).collect())
    };

    let summary = PassSummary::from_outcomes(outcomes);
    progress.on_pass_complete(summary.completed.len(), summary.failed.len(), total);
    Ok(summary)
}

/// Sync every symbol in the registry, then optionally reconcile failures.
pub fn sync(
    source: &dyn QuoteSource,
    store: &CsvStore,
    registry_path: &Path,
    opts: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<SyncReport, SyncError> {
    let symbols = registry::load(registry_path)?;
    let workers = effective_workers(opts.workers);

    let ledger = Ledger::begin(registry_path)?;
    let primary = run_pass(source, store, &ledger, &symbols, workers, &opts.retry, progress)?;

    let reconciliation = if opts.reconcile && !primary.failed.is_empty() {
        let failed = Ledger::read_failed(registry_path)?;
        // A failed fetch may have left a partial or error-shaped artifact;
        // clear it so the retry is a clean full fetch.
        for symbol in &failed {
            store.remove(symbol)?;
        }
        let ledger = Ledger::begin(registry_path)?;
        Some(run_pass(
            source, store, &ledger, &failed, workers, &opts.retry, progress,
        )?)
    } else {
        None
    };

    Ok(SyncReport {
        total: symbols.len(),
        primary,
        reconciliation,
    })
}

/// Add symbols to the registry and resolve only the genuinely new ones.
///
/// No ledger is involved: the outcomes are returned directly.
pub fn add_symbols(
    source: &dyn QuoteSource,
    store: &CsvStore,
    registry_path: &Path,
    symbols: &[String],
    retry: &RetryPolicy,
    progress: &dyn SyncProgress,
) -> Result<Vec<(String, Outcome)>, SyncError> {
    let new = registry::add(registry_path, symbols)?;
    let total = new.len();

    let outcomes = new
        .into_iter()
        .enumerate()
        .map(|(index, symbol)| {
            progress.on_start(&symbol, index, total);
            let outcome = resolve(source, store, &symbol, retry);
            progress.on_outcome(&symbol, &outcome);
            (symbol, outcome)
        })
        .collect();
    Ok(outcomes)
}

/// Remove symbols from the registry and delete their artifacts.
pub fn remove_symbols(
    store: &CsvStore,
    registry_path: &Path,
    symbols: &[String],
) -> Result<(), SyncError> {
    registry::remove(registry_path, symbols)?;
    for symbol in symbols {
        store.remove(symbol)?;
    }
    Ok(())
}
