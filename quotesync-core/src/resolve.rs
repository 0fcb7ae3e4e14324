//! Per-symbol retry wrapper: decide the fetch plan once, then attempt
//! fetch + merge + write up to the retry bound.
//!
//! The window and write mode are derived from the artifact state exactly
//! once per call — every attempt targets the same window, even if an earlier
//! attempt partially succeeded. Transport, status, and error-payload
//! failures are retried; a corrupt artifact is healed (deleted, downgraded
//! to a full fetch) before the first attempt and is never a failure by
//! itself.

use crate::source::{FetchWindow, QuoteSource, SyncError};
use crate::store::{ArtifactState, CsvStore, WriteMode};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Default attempt bound, matching the reference behavior.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry parameters for one `resolve` call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per symbol before the outcome is `Failed`.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts; zero disables
    /// sleeping entirely. Jitter is added so parallel workers don't retry
    /// in lockstep.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }
}

/// Terminal result of resolving one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success { rows_written: usize },
    Failed { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// The fetch plan for one symbol: write mode plus request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub mode: WriteMode,
    pub window: FetchWindow,
}

impl FetchPlan {
    /// Derive the plan from the artifact state at a fixed end time.
    ///
    /// `Absent` and `Corrupt` both map to a full-history replace; the
    /// `start = 0` sentinel deliberately conflates "no data yet" with
    /// "request everything since epoch", as the remote service does.
    pub fn from_state(state: ArtifactState, end: i64) -> Self {
        match state {
            ArtifactState::Valid { last_date } => Self {
                mode: WriteMode::Append,
                window: FetchWindow::since(last_date, end),
            },
            ArtifactState::Absent | ArtifactState::Corrupt => Self {
                mode: WriteMode::Replace,
                window: FetchWindow::full(end),
            },
        }
    }
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Resolve one symbol to a terminal outcome.
pub fn resolve(
    source: &dyn QuoteSource,
    store: &CsvStore,
    symbol: &str,
    policy: &RetryPolicy,
) -> Outcome {
    let state = match store.state(symbol) {
        Ok(s) => s,
        Err(e) => {
            return Outcome::Failed {
                reason: format!("artifact inspection failed: {e}"),
            }
        }
    };
    let plan = FetchPlan::from_state(state, now_epoch());
    resolve_with_plan(source, store, symbol, plan, policy)
}

/// Run the attempt loop for an already-decided plan.
pub fn resolve_with_plan(
    source: &dyn QuoteSource,
    store: &CsvStore,
    symbol: &str,
    plan: FetchPlan,
    policy: &RetryPolicy,
) -> Outcome {
    let mut last_error: Option<SyncError> = None;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 && !policy.base_delay.is_zero() {
            std::thread::sleep(backoff_delay(policy.base_delay, attempt));
        }

        let payload = match source.fetch(symbol, plan.window) {
            Ok(p) => p,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };

        // The remote frames errors as a JSON body even behind a success
        // status. A leading `{` can never start a CSV header, so that one
        // byte is the whole check. Narrow heuristic, specific to this
        // payload framing.
        if payload.as_bytes().first() == Some(&b'{') {
            last_error = Some(SyncError::ErrorPayload);
            continue;
        }

        match store.write(symbol, &payload, plan.mode) {
            Ok(rows_written) => return Outcome::Success { rows_written },
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Outcome::Failed {
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retries exhausted".into()),
    }
}

/// Exponential backoff with up to 50% additive jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base * 2u32.saturating_pow(attempt.saturating_sub(1));
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    exp + Duration::from_millis(jitter_ms)
}
