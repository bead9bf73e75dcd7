//! Per-order structural and temporal validation.
//!
//! Runs before any market data is consulted. Every rejection carries the
//! reason string that ends up in the trade log; no order is silently
//! dropped.

use crate::calendar::is_market_open;
use crate::domain::{Order, RawOrder};
use chrono::NaiveDate;

/// Why the validator refused an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Execution date is strictly before the run date; stale, never retried.
    Past,
    /// Execution date falls on a weekend or holiday.
    Calendar,
    /// The order shape is wrong for its action/order_type combination.
    Malformed,
}

/// A validator rejection with its trade-log reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectKind,
    pub reason: String,
}

/// Validator verdict for one raw order against a run date.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Structurally sound and due today; hand to the matcher.
    Accept(Order),
    /// Due on a later date; goes back into the pending queue unchanged.
    CarryForward,
    /// Dropped, with the reason recorded.
    Reject(Rejection),
}

/// Validate one raw order against the run date.
///
/// Temporal checks come first: a future-dated order is carried forward
/// without structural inspection, so whatever shape it has survives
/// verbatim until it comes due.
pub fn validate(raw: &RawOrder, run_date: NaiveDate) -> Disposition {
    let order_date = match raw.execution_date() {
        Ok(date) => date,
        Err(e) => {
            return Disposition::Reject(Rejection {
                kind: RejectKind::Malformed,
                reason: e.to_string(),
            })
        }
    };

    if order_date < run_date {
        return Disposition::Reject(Rejection {
            kind: RejectKind::Past,
            reason: format!(
                "order date ({}) is before run date ({})",
                order_date, run_date
            ),
        });
    }

    if !is_market_open(order_date) {
        return Disposition::Reject(Rejection {
            kind: RejectKind::Calendar,
            reason: format!("market closed on order date ({})", order_date),
        });
    }

    if order_date > run_date {
        return Disposition::CarryForward;
    }

    match Order::try_from_raw(raw) {
        Ok(order) => Disposition::Accept(order),
        Err(e) => Disposition::Reject(Rejection {
            kind: RejectKind::Malformed,
            reason: e.to_string(),
        }),
    }
}
