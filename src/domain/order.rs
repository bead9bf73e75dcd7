//! Order types: the loose wire shape and the validated tagged form.
//!
//! Decision inputs arrive as JSON produced outside the engine (human or LLM
//! generated), so [`RawOrder`] tolerates every field being absent or
//! mistyped. [`Order`] is the validated form: the action tag is a closed
//! enum whose variants carry exactly the fields that action requires, so no
//! "missing key" checks survive past construction.

use crate::domain::{Decimal, Ticker};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An order exactly as it appears in the pending queue.
///
/// Every field is optional: malformed input must be representable so it can
/// be rejected with a recorded reason instead of failing deserialization of
/// the whole queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOrder {
    pub action: Option<String>,
    pub ticker: Option<String>,
    /// Kept as a JSON number so a fractional share count (e.g. 5.5) can be
    /// detected and reported rather than silently truncated.
    pub shares: Option<serde_json::Number>,
    pub order_type: Option<String>,
    pub limit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    /// Execution date, YYYY-MM-DD.
    pub date: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RawOrder {
    /// Best-effort ticker label for trade-log rows, even when rejecting.
    pub fn ticker_label(&self) -> String {
        self.ticker
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .unwrap_or_default()
    }

    /// Best-effort action label for trade-log rows, even when rejecting.
    pub fn action_label(&self) -> String {
        match self.action.as_deref() {
            Some("buy") => "BUY".to_string(),
            Some("sell") => "SELL".to_string(),
            Some("update_stop") => "UPDATE_STOP".to_string(),
            Some(other) => other.to_uppercase(),
            None => "UNKNOWN".to_string(),
        }
    }

    /// Parse the execution date without validating the rest of the order.
    pub fn execution_date(&self) -> Result<NaiveDate, OrderParseError> {
        let raw = self
            .date
            .as_deref()
            .ok_or(OrderParseError::MissingField("date"))?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| OrderParseError::InvalidDate(raw.to_string()))
    }
}

/// Order pricing mode. A limit order carries its limit price, so "limit
/// order without a price" is unrepresentable after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit(Decimal),
}

/// Validated order action with per-variant required fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Buy {
        shares: u32,
        order_type: OrderType,
        stop_loss: Decimal,
    },
    Sell {
        shares: u32,
        order_type: OrderType,
    },
    UpdateStop {
        stop_loss: Decimal,
    },
}

impl OrderAction {
    /// Uppercase label used in trade-log rows.
    pub fn label(&self) -> &'static str {
        match self {
            OrderAction::Buy { .. } => "BUY",
            OrderAction::Sell { .. } => "SELL",
            OrderAction::UpdateStop { .. } => "UPDATE_STOP",
        }
    }

    /// Share count for actions that trade shares.
    pub fn shares(&self) -> Option<u32> {
        match self {
            OrderAction::Buy { shares, .. } | OrderAction::Sell { shares, .. } => Some(*shares),
            OrderAction::UpdateStop { .. } => None,
        }
    }
}

/// A structurally validated order. Immutable once constructed; the engine
/// consumes it and produces a trade-log row, never edits it.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub ticker: Ticker,
    pub action: OrderAction,
    pub execution_date: NaiveDate,
    pub rationale: Option<String>,
    pub confidence: Option<f64>,
}

impl Order {
    /// Validate a raw order into the tagged form.
    ///
    /// # Errors
    /// Returns the specific structural defect; the message doubles as the
    /// trade-log rejection reason.
    pub fn try_from_raw(raw: &RawOrder) -> Result<Self, OrderParseError> {
        let execution_date = raw.execution_date()?;

        let ticker_str = raw
            .ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(OrderParseError::MissingField("ticker"))?;
        let ticker = Ticker::new(ticker_str);

        let action = match raw.action.as_deref() {
            Some("buy") => OrderAction::Buy {
                shares: parse_shares(raw)?,
                order_type: parse_order_type(raw)?,
                stop_loss: raw
                    .stop_loss
                    .ok_or(OrderParseError::MissingField("stop_loss"))?,
            },
            Some("sell") => OrderAction::Sell {
                shares: parse_shares(raw)?,
                order_type: parse_order_type(raw)?,
            },
            Some("update_stop") => OrderAction::UpdateStop {
                stop_loss: raw
                    .stop_loss
                    .ok_or(OrderParseError::MissingField("stop_loss"))?,
            },
            Some(other) => return Err(OrderParseError::UnknownAction(other.to_string())),
            None => return Err(OrderParseError::MissingField("action")),
        };

        Ok(Order {
            ticker,
            action,
            execution_date,
            rationale: raw.rationale.clone(),
            confidence: raw.confidence,
        })
    }
}

fn parse_shares(raw: &RawOrder) -> Result<u32, OrderParseError> {
    let number = raw
        .shares
        .as_ref()
        .ok_or(OrderParseError::MissingField("shares"))?;

    match number.as_i64() {
        Some(value) if value <= 0 => Err(OrderParseError::SharesNotPositive(number.to_string())),
        Some(value) => u32::try_from(value)
            .map_err(|_| OrderParseError::SharesTooLarge(number.to_string())),
        // A u64 beyond i64::MAX is still an integer, just absurdly large.
        None if number.as_u64().is_some() => {
            Err(OrderParseError::SharesTooLarge(number.to_string()))
        }
        None => Err(OrderParseError::SharesNotInteger(number.to_string())),
    }
}

fn parse_order_type(raw: &RawOrder) -> Result<OrderType, OrderParseError> {
    match raw.order_type.as_deref() {
        Some("market") => Ok(OrderType::Market),
        Some("limit") => {
            let limit_price = raw
                .limit_price
                .ok_or(OrderParseError::MissingField("limit_price"))?;
            Ok(OrderType::Limit(limit_price))
        }
        Some(other) => Err(OrderParseError::UnknownOrderType(other.to_string())),
        None => Err(OrderParseError::MissingField("order_type")),
    }
}

/// Structural defects found while validating a raw order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderParseError {
    #[error("missing or null required field: {0}")]
    MissingField(&'static str),
    #[error("shares ({0}) is not an integer")]
    SharesNotInteger(String),
    #[error("shares ({0}) is not a positive integer")]
    SharesNotPositive(String),
    #[error("shares ({0}) exceeds the supported order size")]
    SharesTooLarge(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("unknown order type: {0}")]
    UnknownOrderType(String),
    #[error("invalid execution date: {0}")]
    InvalidDate(String),
}
