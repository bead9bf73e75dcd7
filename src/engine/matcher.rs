//! Order matcher: fill/rejection decision and position/cash bookkeeping.
//!
//! Deterministic given the same inputs; no clock or randomness. Every
//! rejection path returns before the portfolio is touched, so a FAILED
//! order provably mutates nothing.

use crate::domain::{
    Decimal, MarketQuote, Order, OrderAction, OrderType, Portfolio, TradeRecord,
};

/// Apply one validated order against the day's quote, mutating the
/// portfolio on a fill and returning the trade-log row either way.
pub fn apply(portfolio: &mut Portfolio, order: &Order, quote: &MarketQuote) -> TradeRecord {
    match &order.action {
        OrderAction::Buy {
            shares,
            order_type,
            stop_loss,
        } => apply_buy(portfolio, order, quote, *shares, *order_type, *stop_loss),
        OrderAction::Sell { shares, order_type } => {
            apply_sell(portfolio, order, quote, *shares, *order_type)
        }
        OrderAction::UpdateStop { stop_loss } => apply_update_stop(portfolio, order, *stop_loss),
    }
}

fn apply_buy(
    portfolio: &mut Portfolio,
    order: &Order,
    quote: &MarketQuote,
    shares: u32,
    order_type: OrderType,
    stop_loss: Decimal,
) -> TradeRecord {
    let fill_price = match order_type {
        OrderType::Limit(limit_price) => {
            // A limit buy fills only if the day traded at or below the limit.
            if quote.low > limit_price {
                return TradeRecord::failed(
                    order.execution_date,
                    &order.ticker,
                    order.action.label(),
                    format!(
                        "limit not met: limit price {} (low: {})",
                        limit_price, quote.low
                    ),
                );
            }
            // Cannot fill worse than the limit, can fill better at the open.
            if quote.open <= limit_price {
                quote.open
            } else {
                limit_price
            }
        }
        OrderType::Market => quote.open,
    };

    let cost = Decimal::from(shares) * fill_price;
    if cost > portfolio.cash {
        return TradeRecord::failed(
            order.execution_date,
            &order.ticker,
            order.action.label(),
            format!("insufficient cash: need {}, have {}", cost, portfolio.cash),
        );
    }

    portfolio.cash = portfolio.cash - cost;
    portfolio.add_or_merge(&order.ticker, shares, fill_price, stop_loss);

    TradeRecord::filled(
        order.execution_date,
        &order.ticker,
        order.action.label(),
        Some(shares),
        Some(fill_price),
        None,
    )
}

fn apply_sell(
    portfolio: &mut Portfolio,
    order: &Order,
    quote: &MarketQuote,
    shares: u32,
    order_type: OrderType,
) -> TradeRecord {
    let held = match portfolio.get(&order.ticker) {
        Some(position) => position.shares,
        None => {
            return TradeRecord::failed(
                order.execution_date,
                &order.ticker,
                order.action.label(),
                format!("no position in {}", order.ticker),
            )
        }
    };

    if shares > held {
        return TradeRecord::failed(
            order.execution_date,
            &order.ticker,
            order.action.label(),
            format!("insufficient shares: requested {}, available {}", shares, held),
        );
    }

    let fill_price = match order_type {
        OrderType::Limit(limit_price) => {
            // A limit sell fills only if the day traded at or above the limit.
            if quote.high < limit_price {
                return TradeRecord::failed(
                    order.execution_date,
                    &order.ticker,
                    order.action.label(),
                    format!(
                        "limit not met: limit price {} (high: {})",
                        limit_price, quote.high
                    ),
                );
            }
            if quote.open >= limit_price {
                quote.open
            } else {
                limit_price
            }
        }
        OrderType::Market => quote.open,
    };

    let average_cost = portfolio.reduce(&order.ticker, shares);
    let proceeds = Decimal::from(shares) * fill_price;
    portfolio.cash = portfolio.cash + proceeds;
    let realized_pnl = (fill_price - average_cost) * Decimal::from(shares);

    TradeRecord::filled(
        order.execution_date,
        &order.ticker,
        order.action.label(),
        Some(shares),
        Some(fill_price),
        Some(realized_pnl),
    )
}

fn apply_update_stop(portfolio: &mut Portfolio, order: &Order, stop_loss: Decimal) -> TradeRecord {
    if portfolio.set_stop_loss(&order.ticker, stop_loss) {
        TradeRecord::filled(
            order.execution_date,
            &order.ticker,
            order.action.label(),
            None,
            None,
            None,
        )
    } else {
        TradeRecord::failed(
            order.execution_date,
            &order.ticker,
            order.action.label(),
            format!("{} not in portfolio", order.ticker),
        )
    }
}
