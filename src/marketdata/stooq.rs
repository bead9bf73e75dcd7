//! Stooq daily-bar provider.
//!
//! Stooq serves daily history as CSV (`Date,Open,High,Low,Close,Volume`)
//! with no API key. US tickers are lowercased and suffixed `.us`.

use super::{MarketData, MarketDataError};
use crate::domain::{Decimal, MarketQuote, Ticker};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Market data source backed by the stooq.com CSV endpoint.
#[derive(Debug, Clone)]
pub struct StooqMarketData {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: String,
    #[serde(rename = "High")]
    high: String,
    #[serde(rename = "Low")]
    low: String,
    #[serde(rename = "Close")]
    close: String,
    #[serde(rename = "Volume")]
    volume: Option<String>,
}

impl StooqMarketData {
    /// Create a new stooq data source against the given base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Create with the public stooq.com endpoint.
    pub fn default_url() -> Self {
        Self::new("https://stooq.com".to_string())
    }

    /// Map a US equity ticker to stooq's symbol convention.
    fn stooq_symbol(ticker: &Ticker) -> String {
        let lower = ticker.as_str().to_lowercase();
        if lower.contains('.') {
            lower
        } else {
            format!("{}.us", lower)
        }
    }

    async fn fetch_csv(&self, symbol: &str, date: NaiveDate) -> Result<String, MarketDataError> {
        let url = format!("{}/q/d/l/", self.base_url);
        let day = date.format("%Y%m%d").to_string();
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("s", symbol), ("i", "d"), ("d1", day.as_str()), ("d2", day.as_str())])
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(MarketDataError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(MarketDataError::HttpError {
                    status: status.as_u16(),
                    message: "Transient server response".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(MarketDataError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response.text().await.map_err(|e| {
                backoff::Error::permanent(MarketDataError::ParseError(e.to_string()))
            })
        })
        .await
    }

    fn parse_bar(
        body: &str,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<MarketQuote, MarketDataError> {
        if body.trim().is_empty() || body.starts_with("No data") {
            return Err(MarketDataError::DataUnavailable {
                ticker: ticker.clone(),
                date,
            });
        }

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let wanted = date.format("%Y-%m-%d").to_string();
        for result in reader.deserialize::<StooqRow>() {
            let row = result.map_err(|e| MarketDataError::ParseError(e.to_string()))?;
            if row.date != wanted {
                continue;
            }
            return Ok(MarketQuote {
                ticker: ticker.clone(),
                open: parse_price(&row.open)?,
                high: parse_price(&row.high)?,
                low: parse_price(&row.low)?,
                close: parse_price(&row.close)?,
                volume: row
                    .volume
                    .as_deref()
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(|v| v as i64)
                    .unwrap_or(0),
            });
        }

        Err(MarketDataError::DataUnavailable {
            ticker: ticker.clone(),
            date,
        })
    }
}

fn parse_price(raw: &str) -> Result<Decimal, MarketDataError> {
    Decimal::from_str(raw)
        .map_err(|_| MarketDataError::ParseError(format!("invalid price field: {}", raw)))
}

#[async_trait]
impl MarketData for StooqMarketData {
    async fn get_quote(
        &self,
        ticker: &Ticker,
        date: NaiveDate,
    ) -> Result<MarketQuote, MarketDataError> {
        let symbol = Self::stooq_symbol(ticker);
        debug!(ticker = %ticker, %symbol, %date, "Fetching stooq daily bar");
        let body = self.fetch_csv(&symbol, date).await?;
        Self::parse_bar(&body, ticker, date)
    }
}
