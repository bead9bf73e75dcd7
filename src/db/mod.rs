//! Ledger store: SQLite persistence for portfolio state, append-only
//! history, the pending-orders queue, and the run log.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for ledger operations

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{LedgerSnapshot, Repository};
