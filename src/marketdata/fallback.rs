//! Ordered fallback chain over multiple market data providers.

use super::{MarketData, MarketDataError};
use crate::domain::{MarketQuote, Ticker};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

/// Tries each configured provider in order and returns the first bar found.
///
/// Provider errors are logged and the chain moves on; only when every
/// provider has failed does the last error surface to the caller.
#[derive(Debug, Clone)]
pub struct FallbackMarketData {
    sources: Vec<Arc<dyn MarketData>>,
}

impl FallbackMarketData {
    /// Create a chain from an ordered list of providers.
    ///
    /// # Panics
    /// Panics if `sources` is empty; a chain with nothing to try is a
    /// configuration bug.
    pub fn new(sources: Vec<Arc<dyn MarketData>>) -> Self {
        assert!(!sources.is_empty(), "fallback chain requires at least one source");
        Self { sources }
    }
}

#[async_trait]
impl MarketData for FallbackMarketData {
    async fn get_quote(
        &self,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<MarketQuote, MarketDataError> {
        let mut last_error = None;
        for source in &self.sources {
            match source.get_quote(ticker, date).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    warn!(ticker = %ticker, %date, error = %e, "Market data source failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.expect("chain has at least one source"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;
    use crate::marketdata::MockMarketData;
    use std::str::FromStr;

    fn quote(ticker: &str) -> MarketQuote {
        MarketQuote {
            ticker: Ticker::new(ticker),
            open: Decimal::from_str("10").unwrap(),
            high: Decimal::from_str("11").unwrap(),
            low: Decimal::from_str("9").unwrap(),
            close: Decimal::from_str("10.5").unwrap(),
            volume: 100,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[tokio::test]
    async fn test_first_source_wins() {
        let primary = Arc::new(MockMarketData::new().with_quote(date(), quote("AAPL")));
        let secondary = Arc::new(MockMarketData::new());
        let chain = FallbackMarketData::new(vec![primary, secondary]);

        let result = chain.get_quote(&Ticker::new("AAPL"), date()).await.unwrap();
        assert_eq!(result, quote("AAPL"));
    }

    #[tokio::test]
    async fn test_falls_through_to_second_source() {
        let primary = Arc::new(MockMarketData::new().with_network_failure(Ticker::new("AAPL")));
        let secondary = Arc::new(MockMarketData::new().with_quote(date(), quote("AAPL")));
        let chain = FallbackMarketData::new(vec![primary, secondary]);

        let result = chain.get_quote(&Ticker::new("AAPL"), date()).await.unwrap();
        assert_eq!(result, quote("AAPL"));
    }

    #[tokio::test]
    async fn test_all_sources_exhausted_returns_last_error() {
        let primary = Arc::new(MockMarketData::new());
        let secondary = Arc::new(MockMarketData::new());
        let chain = FallbackMarketData::new(vec![primary, secondary]);

        let err = chain
            .get_quote(&Ticker::new("AAPL"), date())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::DataUnavailable { .. }));
    }
}
