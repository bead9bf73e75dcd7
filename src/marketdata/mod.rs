//! Market data abstraction for fetching daily OHLCV bars.
//!
//! The engine consumes a [`MarketQuote`] for a (ticker, date) pair and does
//! not care where it comes from. Provider selection, retry, and fallback all
//! live behind this trait; the core never retries.

use crate::domain::{MarketQuote, Ticker};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

pub mod fallback;
pub mod mock;
pub mod stooq;

pub use fallback::FallbackMarketData;
pub use mock::MockMarketData;
pub use stooq::StooqMarketData;

/// Market data source trait.
///
/// Implementations must be deterministic for a given (ticker, date) within a
/// run: the matcher and the valuation pass may both ask for the same bar.
#[async_trait]
pub trait MarketData: Send + Sync + fmt::Debug {
    /// Fetch the daily bar for `ticker` on `date`.
    ///
    /// # Errors
    /// Returns [`MarketDataError::DataUnavailable`] if the market was closed
    /// or the ticker has no data for that date.
    async fn get_quote(&self, ticker: &Ticker, date: NaiveDate)
        -> Result<MarketQuote, MarketDataError>;
}

/// Error type for market data operations.
#[derive(Debug, Clone)]
pub enum MarketDataError {
    /// Market closed or no bar exists for the (ticker, date) pair.
    DataUnavailable { ticker: Ticker, date: NaiveDate },
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (malformed CSV or unexpected payload)
    ParseError(String),
}

impl fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketDataError::DataUnavailable { ticker, date } => {
                write!(f, "No market data for {} on {}", ticker, date)
            }
            MarketDataError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            MarketDataError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            MarketDataError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for MarketDataError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketDataError::DataUnavailable {
            ticker: Ticker::new("AAPL"),
            date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        };
        assert_eq!(err.to_string(), "No market data for AAPL on 2026-03-07");

        let err = MarketDataError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = MarketDataError::ParseError("bad CSV header".to_string());
        assert_eq!(err.to_string(), "Parse error: bad CSV header");
    }
}
