pub mod calendar;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod marketdata;
pub mod run;

pub use config::Config;
pub use db::{init_db, LedgerSnapshot, Repository};
pub use domain::{
    Decimal, MarketQuote, Order, OrderAction, OrderType, Portfolio, Position, RawOrder, RunStatus,
    Ticker, TradeRecord, TradeStatus,
};
pub use error::RunError;
pub use marketdata::{FallbackMarketData, MarketData, MarketDataError, MockMarketData,
    StooqMarketData};
pub use run::{process_one_day, RunOrchestrator, RunPhase, RunSummary};
