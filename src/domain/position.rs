//! Portfolio state: held positions plus cash.
//!
//! The portfolio is plain in-memory state passed by exclusive ownership
//! through the run pipeline; persistence lives in the repository layer and
//! fill decisions in the matcher. Only the bookkeeping primitives live here.

use crate::domain::{Decimal, Ticker};
use std::collections::BTreeMap;

/// One held position. A row exists only while `shares > 0`; selling a
/// position down to zero removes it from the portfolio entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub ticker: Ticker,
    pub shares: u32,
    /// Total dollars paid for the shares currently held (not per-share).
    pub cost_basis: Decimal,
    pub stop_loss: Option<Decimal>,
    /// Closing price from the most recent valuation; None until valued.
    pub market_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

impl Position {
    /// Weighted-average purchase price: cost basis over shares held.
    pub fn average_cost(&self) -> Decimal {
        self.cost_basis / Decimal::from(self.shares)
    }
}

/// The full set of positions plus the cash balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    positions: BTreeMap<Ticker, Position>,
    pub cash: Decimal,
}

impl Portfolio {
    pub fn new(cash: Decimal) -> Self {
        Portfolio {
            positions: BTreeMap::new(),
            cash,
        }
    }

    /// Rebuild a portfolio from persisted rows.
    pub fn from_rows(positions: Vec<Position>, cash: Decimal) -> Self {
        Portfolio {
            positions: positions.into_iter().map(|p| (p.ticker.clone(), p)).collect(),
            cash,
        }
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn holds(&self, ticker: &Ticker) -> bool {
        self.positions.contains_key(ticker)
    }

    /// Open positions in ticker order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Apply a filled buy: merge into an existing position by weighted
    /// average cost basis, or open a new one with the order's stop loss.
    ///
    /// Merging never overwrites an existing stop loss; that is what the
    /// update_stop action is for.
    pub fn add_or_merge(
        &mut self,
        ticker: &Ticker,
        shares: u32,
        fill_price: Decimal,
        stop_loss: Decimal,
    ) {
        let cost = Decimal::from(shares) * fill_price;
        match self.positions.get_mut(ticker) {
            Some(position) => {
                position.shares += shares;
                position.cost_basis = position.cost_basis + cost;
            }
            None => {
                self.positions.insert(
                    ticker.clone(),
                    Position {
                        ticker: ticker.clone(),
                        shares,
                        cost_basis: cost,
                        stop_loss: Some(stop_loss),
                        market_price: None,
                        market_value: None,
                        unrealized_pnl: None,
                    },
                );
            }
        }
    }

    /// Apply a filled sell of `shares` (caller has already checked
    /// availability). Returns the pre-trade average cost for PnL.
    ///
    /// A remainder of zero deletes the row; otherwise the cost basis is
    /// scaled so the per-share basis stays at the pre-trade average cost.
    pub fn reduce(&mut self, ticker: &Ticker, shares: u32) -> Decimal {
        let position = self
            .positions
            .get_mut(ticker)
            .expect("reduce requires a held position");
        debug_assert!(shares <= position.shares);

        let average_cost = position.average_cost();
        let remaining = position.shares - shares;
        if remaining == 0 {
            self.positions.remove(ticker);
        } else {
            position.shares = remaining;
            position.cost_basis = average_cost * Decimal::from(remaining);
        }
        average_cost
    }

    /// Overwrite the stop loss on an existing position. Returns false if
    /// the ticker is not held; never touches cash or shares.
    pub fn set_stop_loss(&mut self, ticker: &Ticker, stop_loss: Decimal) -> bool {
        match self.positions.get_mut(ticker) {
            Some(position) => {
                position.stop_loss = Some(stop_loss);
                true
            }
            None => false,
        }
    }

    /// Refresh the market columns of one position from a closing price.
    pub fn refresh_market(&mut self, ticker: &Ticker, close: Decimal) {
        if let Some(position) = self.positions.get_mut(ticker) {
            let market_value = close * Decimal::from(position.shares);
            position.market_price = Some(close);
            position.market_value = Some(market_value);
            position.unrealized_pnl = Some(market_value - position.cost_basis);
        }
    }
}
