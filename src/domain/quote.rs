//! Daily market quote consumed by the matcher and valuation.

use crate::domain::{Decimal, Ticker};
use serde::{Deserialize, Serialize};

/// One trading day's OHLCV bar for a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub ticker: Ticker,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}
