//! Mock market data source for testing without network calls.

use super::{MarketData, MarketDataError};
use crate::domain::{MarketQuote, Ticker};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

/// Mock market data source returning canned daily bars.
///
/// Tickers without a canned bar yield `DataUnavailable`; tickers registered
/// with [`MockMarketData::with_network_failure`] yield a network error, which
/// the engine treats as fatal.
#[derive(Debug, Clone, Default)]
pub struct MockMarketData {
    quotes: HashMap<(Ticker, NaiveDate), MarketQuote>,
    failures: HashSet<Ticker>,
}

impl MockMarketData {
    /// Create a new mock with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bar for its ticker on the given date.
    pub fn with_quote(mut self, date: NaiveDate, quote: MarketQuote) -> Self {
        self.quotes.insert((quote.ticker.clone(), date), quote);
        self
    }

    /// Make every lookup for `ticker` fail with a network error.
    pub fn with_network_failure(mut self, ticker: Ticker) -> Self {
        self.failures.insert(ticker);
        self
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn get_quote(
        &self,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<MarketQuote, MarketDataError> {
        if self.failures.contains(ticker) {
            return Err(MarketDataError::NetworkError(format!(
                "simulated outage for {}",
                ticker
            )));
        }
        self.quotes
            .get(&(ticker.clone(), date))
            .cloned()
            .ok_or_else(|| MarketDataError::DataUnavailable {
                ticker: ticker.clone(),
                date,
            })
    }
}
