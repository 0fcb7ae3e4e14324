//! Yahoo Finance quote source.
//!
//! Fetches daily history as CSV from the v7 download endpoint. One bounded
//! request per call; no retry here and no payload inspection beyond the
//! transport status — both belong to the retry wrapper.
//!
//! Yahoo has no official API and is subject to unannounced format changes.

use crate::source::{FetchWindow, QuoteSource, SyncError};
use std::time::Duration;

/// Deadline for a single download request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct YahooSource {
    client: reqwest::blocking::Client,
}

impl YahooSource {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// Download URL for a symbol and epoch window.
    fn download_url(symbol: &str, window: FetchWindow) -> String {
        format!(
            "https://query1.finance.yahoo.com/v7/finance/download/{symbol}\
             ?period1={}&period2={}&interval=1d\
             &events=history&includeAdjustedClose=true",
            window.start, window.end
        )
    }
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, window: FetchWindow) -> Result<String, SyncError> {
        let url = Self::download_url(symbol, window);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|e| SyncError::Transport(e.to_string()))
    }
}
