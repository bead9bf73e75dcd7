//! Append-only row types: trade log, portfolio history, position history,
//! and the per-run summary log.

use crate::domain::{Decimal, Ticker};
use chrono::{DateTime, NaiveDate, Utc};

/// Outcome of one processed order attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    /// Order executed and the portfolio was mutated.
    Filled,
    /// Order reached the matcher but could not execute (limit not met,
    /// insufficient cash or shares, unknown ticker).
    Failed,
    /// Order never reached the matcher (stale date, closed calendar,
    /// malformed shape).
    Rejected,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Filled => "FILLED",
            TradeStatus::Failed => "FAILED",
            TradeStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FILLED" => Some(TradeStatus::Filled),
            "FAILED" => Some(TradeStatus::Failed),
            "REJECTED" => Some(TradeStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable trade-log row per order attempt.
///
/// Ticker and action are plain strings so that orders too malformed to
/// validate still leave an attributable row behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub action: String,
    pub shares: Option<u32>,
    pub fill_price: Option<Decimal>,
    /// Realized PnL; populated on filled sells only.
    pub realized_pnl: Option<Decimal>,
    pub status: TradeStatus,
    /// Human-readable cause; populated on every non-FILLED row.
    pub reason: Option<String>,
}

impl TradeRecord {
    pub fn filled(
        date: NaiveDate,
        ticker: &Ticker,
        action: &str,
        shares: Option<u32>,
        fill_price: Option<Decimal>,
        realized_pnl: Option<Decimal>,
    ) -> Self {
        TradeRecord {
            date,
            ticker: ticker.as_str().to_string(),
            action: action.to_string(),
            shares,
            fill_price,
            realized_pnl,
            status: TradeStatus::Filled,
            reason: None,
        }
    }

    pub fn failed(date: NaiveDate, ticker: &Ticker, action: &str, reason: String) -> Self {
        TradeRecord {
            date,
            ticker: ticker.as_str().to_string(),
            action: action.to_string(),
            shares: None,
            fill_price: None,
            realized_pnl: None,
            status: TradeStatus::Failed,
            reason: Some(reason),
        }
    }

    pub fn rejected(date: NaiveDate, ticker: String, action: String, reason: String) -> Self {
        TradeRecord {
            date,
            ticker,
            action,
            shares: None,
            fill_price: None,
            realized_pnl: None,
            status: TradeStatus::Rejected,
            reason: Some(reason),
        }
    }
}

/// One immutable row per processed trading day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioHistoryRow {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub equity: Decimal,
    pub positions_value: Decimal,
    /// Day-over-day return percentage; None on the first-ever row.
    pub daily_return_pct: Option<Decimal>,
    /// Return percentage since inception, against starting cash.
    pub overall_return_pct: Decimal,
}

/// One immutable row per (day, held ticker): a point-in-time snapshot of an
/// open position after valuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionHistoryRow {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub shares: u32,
    pub avg_cost: Decimal,
    pub stop_loss: Option<Decimal>,
    pub market_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Outcome of one whole processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The run committed; every effect is durable.
    Success,
    /// The run failed; the ledger was restored to its pre-run snapshot.
    Failure,
    /// The market was closed on the run date; nothing was mutated.
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failure => "FAILURE",
            RunStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(RunStatus::Success),
            "FAILURE" => Some(RunStatus::Failure),
            "SKIPPED" => Some(RunStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per processing attempt, written outside the rollback boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLogEntry {
    pub date: NaiveDate,
    pub weekday: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub market_open: bool,
    pub status: RunStatus,
    pub orders_filled: u32,
    pub orders_failed: u32,
    pub orders_rejected: u32,
    pub orders_deferred: u32,
    /// End-of-day equity; absent when the run never reached valuation.
    pub equity: Option<Decimal>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_roundtrip() {
        for status in [TradeStatus::Filled, TradeStatus::Failed, TradeStatus::Rejected] {
            assert_eq!(TradeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TradeStatus::parse("SKIPPED"), None);
    }

    #[test]
    fn test_run_status_roundtrip() {
        for status in [RunStatus::Success, RunStatus::Failure, RunStatus::Skipped] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("FILLED"), None);
    }

    #[test]
    fn test_filled_record_has_no_reason() {
        let record = TradeRecord::filled(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            &Ticker::new("AAPL"),
            "BUY",
            Some(10),
            Some(Decimal::from_str("49").unwrap()),
            None,
        );
        assert_eq!(record.status, TradeStatus::Filled);
        assert_eq!(record.reason, None);
    }

    #[test]
    fn test_non_filled_records_carry_reason() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let failed = TradeRecord::failed(date, &Ticker::new("AAPL"), "BUY", "limit not met".into());
        assert_eq!(failed.reason.as_deref(), Some("limit not met"));

        let rejected =
            TradeRecord::rejected(date, "AAPL".into(), "BUY".into(), "stale order".into());
        assert_eq!(rejected.status, TradeStatus::Rejected);
        assert_eq!(rejected.reason.as_deref(), Some("stale order"));
    }
}
