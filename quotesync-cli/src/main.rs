//! QuoteSync CLI — keep a local mirror of daily quote CSVs up to date.
//!
//! Commands:
//! - `sync` — fetch or incrementally update every symbol in the registry,
//!   then re-drive the recorded failures once
//! - `add` — register new symbols and fetch only those
//! - `remove` — drop symbols from the registry and delete their artifacts
//! - `status` — report per-symbol artifact coverage

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quotesync_core::{
    add_symbols, remove_symbols, sync, CsvStore, SilentProgress, StdoutProgress, SyncConfig,
    SyncOptions, SyncProgress, YahooSource,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "quotesync", about = "Incremental daily quote downloader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every symbol in the registry, reconciling failures once.
    Sync {
        /// Newline-delimited symbol list.
        #[arg(long, default_value = "tickers.txt")]
        registry: PathBuf,

        /// Directory holding one CSV artifact per symbol.
        #[arg(long, default_value = "csv_files")]
        data_dir: PathBuf,

        /// Worker pool size. 0 uses available parallelism; 1 is sequential.
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Skip the reconciliation pass over the failed list.
        #[arg(long, default_value_t = false)]
        no_reconcile: bool,

        /// Optional TOML config supplying defaults (flags win).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a JSON run report to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Suppress per-symbol progress output.
        #[arg(long, default_value_t = false)]
        quiet: bool,
    },
    /// Add symbols to the registry and fetch only the new ones.
    Add {
        /// Symbols to add (e.g. GOOG AAPL TSLA).
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value = "tickers.txt")]
        registry: PathBuf,

        #[arg(long, default_value = "csv_files")]
        data_dir: PathBuf,
    },
    /// Remove symbols from the registry and delete their artifacts.
    Remove {
        /// Symbols to remove.
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value = "tickers.txt")]
        registry: PathBuf,

        #[arg(long, default_value = "csv_files")]
        data_dir: PathBuf,
    },
    /// Report per-symbol artifact coverage.
    Status {
        #[arg(long, default_value = "csv_files")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            registry,
            data_dir,
            workers,
            no_reconcile,
            config,
            report,
            quiet,
        } => run_sync(registry, data_dir, workers, no_reconcile, config, report, quiet),
        Commands::Add {
            symbols,
            registry,
            data_dir,
        } => run_add(symbols, &registry, &data_dir),
        Commands::Remove {
            symbols,
            registry,
            data_dir,
        } => run_remove(symbols, &registry, &data_dir),
        Commands::Status { data_dir } => run_status(&data_dir),
    }
}

/// Both paths must exist before any work begins; a partial run against a
/// missing directory is worse than no run.
fn validate_paths(registry: &Path, data_dir: &Path) -> Result<()> {
    if !registry.exists() {
        bail!(
            "registry file does not exist: {} (create it with one symbol per line)",
            registry.display()
        );
    }
    if !data_dir.exists() {
        bail!(
            "data directory does not exist: {} (create it first)",
            data_dir.display()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_sync(
    mut registry: PathBuf,
    mut data_dir: PathBuf,
    mut workers: usize,
    no_reconcile: bool,
    config: Option<PathBuf>,
    report_path: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let mut reconcile = !no_reconcile;

    if let Some(path) = config {
        let cfg = SyncConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?;
        // Flags at their defaults yield to the config file.
        if registry == PathBuf::from("tickers.txt") {
            if let Some(r) = cfg.registry {
                registry = r;
            }
        }
        if data_dir == PathBuf::from("csv_files") {
            if let Some(d) = cfg.data_dir {
                data_dir = d;
            }
        }
        if workers == 0 {
            if let Some(w) = cfg.workers {
                workers = w;
            }
        }
        if !no_reconcile {
            if let Some(r) = cfg.reconcile {
                reconcile = r;
            }
        }
    }

    validate_paths(&registry, &data_dir)?;

    let source = YahooSource::new();
    let store = CsvStore::new(&data_dir);
    let opts = SyncOptions {
        workers,
        reconcile,
        ..SyncOptions::default()
    };
    let progress: &dyn SyncProgress = if quiet { &SilentProgress } else { &StdoutProgress };

    let report = sync(&source, &store, &registry, &opts, progress)?;

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("Report written to: {}", path.display());
    }

    if !report.all_succeeded() {
        for (symbol, reason) in report.final_failures() {
            eprintln!("Error for {symbol}: {reason}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_add(symbols: Vec<String>, registry: &Path, data_dir: &Path) -> Result<()> {
    validate_paths(registry, data_dir)?;

    let source = YahooSource::new();
    let store = CsvStore::new(data_dir);
    let outcomes = add_symbols(
        &source,
        &store,
        registry,
        &symbols,
        &Default::default(),
        &StdoutProgress,
    )?;

    if outcomes.is_empty() {
        println!("All symbols already present in the registry.");
        return Ok(());
    }

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|(_, o)| !o.is_success())
        .map(|(s, _)| s.as_str())
        .collect();
    if !failed.is_empty() {
        eprintln!("Failed to fetch: {}", failed.join(", "));
        std::process::exit(1);
    }
    Ok(())
}

fn run_remove(symbols: Vec<String>, registry: &Path, data_dir: &Path) -> Result<()> {
    validate_paths(registry, data_dir)?;

    let store = CsvStore::new(data_dir);
    remove_symbols(&store, registry, &symbols)?;
    for symbol in &symbols {
        println!("Removed: {symbol}");
    }
    Ok(())
}

fn run_status(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Data directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let store = CsvStore::new(data_dir);
    let symbols = store.list_symbols()?;
    if symbols.is_empty() {
        println!("No artifacts in: {}", data_dir.display());
        return Ok(());
    }

    println!("{:<8} {:<25} {:>8}", "Symbol", "Date Range", "Rows");
    println!("{}", "-".repeat(43));
    for symbol in &symbols {
        match store.load(symbol) {
            Ok(rows) if !rows.is_empty() => {
                let range = format!(
                    "{} to {}",
                    rows.first().unwrap().date,
                    rows.last().unwrap().date
                );
                println!("{:<8} {:<25} {:>8}", symbol, range, rows.len());
            }
            Ok(_) => println!("{:<8} {:<25} {:>8}", symbol, "(empty)", 0),
            Err(_) => println!("{:<8} {:<25} {:>8}", symbol, "(unreadable)", "-"),
        }
    }
    Ok(())
}
