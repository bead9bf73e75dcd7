//! Domain types for the order-execution and ledger engine.
//!
//! This module provides:
//! - Lossless monetary handling via the Decimal wrapper
//! - The Ticker primitive
//! - Raw and validated Order shapes with a tagged action union
//! - Portfolio/Position state and the append-only history row types

pub mod decimal;
pub mod history;
pub mod order;
pub mod position;
pub mod primitives;
pub mod quote;

pub use decimal::Decimal;
pub use history::{
    PortfolioHistoryRow, PositionHistoryRow, RunLogEntry, RunStatus, TradeRecord, TradeStatus,
};
pub use order::{Order, OrderAction, OrderParseError, OrderType, RawOrder};
pub use position::{Portfolio, Position};
pub use primitives::Ticker;
pub use quote::MarketQuote;
