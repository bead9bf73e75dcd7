//! Fatal-error channel for a processing run.
//!
//! Per-order outcomes are data ([`crate::domain::TradeStatus`]) and never
//! travel as errors. This type is reserved for the failures that abort a run:
//! contract violations, collaborator failures, and storage errors.

use crate::marketdata::MarketDataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// A quote could not be obtained for an order or a valuation.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// Ledger storage failed.
    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// A programming-contract failure (e.g. missing market valuation before
    /// the history append, or a snapshot API misuse). Never user-recoverable.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The run date is ahead of the wall-clock date.
    #[error("cannot process run date {run_date}: it is after today ({today})")]
    FutureRunDate {
        run_date: chrono::NaiveDate,
        today: chrono::NaiveDate,
    },

    /// The run failed and every ledger artifact was restored to its pre-run
    /// state. The triggering cause is attached.
    #[error("run failed; ledger rolled back to its pre-run snapshot: {source}")]
    RolledBack {
        #[source]
        source: Box<RunError>,
    },

    /// The run failed AND the snapshot could not be fully restored. There is
    /// no second-level fallback past this point; the ledger must be treated
    /// as suspect.
    #[error("rollback failed, ledger state is unrecoverable: {detail} (original failure: {cause})")]
    RollbackFailed { detail: String, cause: String },
}

impl RunError {
    /// True for outcomes where the ledger was left untouched or fully
    /// restored (everything except a failed rollback).
    pub fn ledger_intact(&self) -> bool {
        !matches!(self, RunError::RollbackFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolled_back_attaches_cause() {
        let cause = RunError::ContractViolation("market_value missing for AAPL".to_string());
        let err = RunError::RolledBack {
            source: Box::new(cause),
        };
        let message = err.to_string();
        assert!(message.contains("rolled back"));
        assert!(message.contains("market_value missing"));
        assert!(err.ledger_intact());
    }

    #[test]
    fn test_rollback_failed_is_not_intact() {
        let err = RunError::RollbackFailed {
            detail: "disk full".to_string(),
            cause: "quote fetch failed".to_string(),
        };
        assert!(!err.ledger_intact());
    }
}
