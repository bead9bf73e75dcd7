//! History appender: daily equity math and row derivation.
//!
//! Runs after every order is applied and every open position has been
//! revalued against the day's close. The missing-valuation check is a
//! programming contract, not a recoverable condition: hitting it aborts
//! the run.

use crate::domain::{Decimal, Portfolio, PortfolioHistoryRow, PositionHistoryRow};
use crate::error::RunError;
use chrono::NaiveDate;

/// The rows a successful day appends to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub portfolio_row: PortfolioHistoryRow,
    pub position_rows: Vec<PositionHistoryRow>,
}

impl DailyReport {
    /// End-of-day total equity.
    pub fn equity(&self) -> Decimal {
        self.portfolio_row.equity
    }
}

/// Derive the day's history rows from the valued portfolio.
///
/// `prior_equity` is the equity of the most recent history row (None on the
/// first-ever run); `starting_cash` is the inception baseline.
///
/// # Errors
/// Returns a contract violation if any open position lacks a market
/// valuation, or if the starting-cash baseline is not positive.
pub fn build_daily_report(
    portfolio: &Portfolio,
    run_date: NaiveDate,
    prior_equity: Option<Decimal>,
    starting_cash: Decimal,
) -> Result<DailyReport, RunError> {
    if !starting_cash.is_positive() {
        return Err(RunError::ContractViolation(format!(
            "starting cash baseline must be positive, got {}",
            starting_cash
        )));
    }

    let mut positions_value = Decimal::zero();
    let mut position_rows = Vec::with_capacity(portfolio.len());

    for position in portfolio.positions() {
        let (market_price, market_value, unrealized_pnl) = match (
            position.market_price,
            position.market_value,
            position.unrealized_pnl,
        ) {
            (Some(price), Some(value), Some(pnl)) => (price, value, pnl),
            _ => {
                return Err(RunError::ContractViolation(format!(
                    "market valuation missing for {} before history append",
                    position.ticker
                )))
            }
        };

        positions_value = positions_value + market_value;
        position_rows.push(PositionHistoryRow {
            date: run_date,
            ticker: position.ticker.clone(),
            shares: position.shares,
            avg_cost: position.average_cost(),
            stop_loss: position.stop_loss,
            market_price,
            market_value,
            unrealized_pnl,
        });
    }

    let equity = positions_value + portfolio.cash;

    // No defined return against a zero base; recorded as absent.
    let daily_return_pct = prior_equity
        .filter(|prior| !prior.is_zero())
        .map(|prior| (equity / prior - Decimal::from(1u32)) * Decimal::hundred());
    let overall_return_pct =
        (equity / starting_cash - Decimal::from(1u32)) * Decimal::hundred();

    Ok(DailyReport {
        portfolio_row: PortfolioHistoryRow {
            date: run_date,
            cash: portfolio.cash,
            equity,
            positions_value,
            daily_return_pct,
            overall_return_pct,
        },
        position_rows,
    })
}
