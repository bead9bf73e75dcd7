//! Repository layer for ledger operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `positions.rs` - current portfolio state (positions + cash)
//! - `history.rs` - append-only history tables and the run log
//! - `orders.rs` - the pending-orders queue
//!
//! Monetary columns are stored as canonical decimal strings; a value that
//! fails to parse back is a storage fault and surfaces as a decode error,
//! never as a silent default.

mod history;
mod orders;
mod positions;

use crate::domain::Decimal;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub(crate) const META_CASH: &str = "cash";
pub(crate) const META_STARTING_CASH: &str = "starting_cash";

/// A deep, independent copy of every artifact inside the rollback boundary:
/// positions, meta scalars (cash, starting cash), the three history tables,
/// and the pending-orders queue. Row ids are captured verbatim so a restore
/// reproduces the tables exactly.
///
/// The run log is deliberately absent: a FAILURE row written after a
/// rollback must survive the rollback it reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    pub positions: Vec<PositionRow>,
    pub meta: Vec<(String, String)>,
    pub portfolio_history: Vec<PortfolioHistoryRecord>,
    pub position_history: Vec<PositionHistoryRecord>,
    pub trade_log: Vec<TradeLogRecord>,
    pub pending_orders: Vec<(i64, String)>,
}

/// Raw `positions` table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRow {
    pub ticker: String,
    pub shares: i64,
    pub cost_basis: String,
    pub stop_loss: Option<String>,
    pub market_price: Option<String>,
    pub market_value: Option<String>,
    pub unrealized_pnl: Option<String>,
}

/// Raw `portfolio_history` table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioHistoryRecord {
    pub id: i64,
    pub date: String,
    pub cash: String,
    pub equity: String,
    pub positions_value: String,
    pub daily_return_pct: Option<String>,
    pub overall_return_pct: String,
}

/// Raw `position_history` table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionHistoryRecord {
    pub id: i64,
    pub date: String,
    pub ticker: String,
    pub shares: i64,
    pub avg_cost: String,
    pub stop_loss: Option<String>,
    pub market_price: String,
    pub market_value: String,
    pub unrealized_pnl: String,
}

/// Raw `trade_log` table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLogRecord {
    pub id: i64,
    pub date: String,
    pub ticker: String,
    pub action: String,
    pub shares: Option<i64>,
    pub fill_price: Option<String>,
    pub realized_pnl: Option<String>,
    pub status: String,
    pub reason: Option<String>,
}

/// Repository for ledger operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Meta scalars
    // =========================================================================

    /// Seed cash and starting cash into a fresh ledger. Existing values are
    /// left untouched, so re-opening an established ledger is a no-op.
    pub async fn ensure_seeded(&self, starting_cash: Decimal) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for key in [META_CASH, META_STARTING_CASH] {
            sqlx::query("INSERT OR IGNORE INTO portfolio_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(starting_cash.to_canonical_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Current cash balance.
    pub async fn get_cash(&self) -> Result<Decimal, sqlx::Error> {
        self.get_meta_decimal(META_CASH).await
    }

    /// The inception cash baseline used for the overall-return column.
    pub async fn get_starting_cash(&self) -> Result<Decimal, sqlx::Error> {
        self.get_meta_decimal(META_STARTING_CASH).await
    }

    async fn get_meta_decimal(&self, key: &str) -> Result<Decimal, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM portfolio_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let raw: String = row
            .ok_or_else(|| {
                sqlx::Error::Decode(
                    format!("portfolio_meta missing required key '{}'", key).into(),
                )
            })?
            .get("value");
        decode_decimal(&raw, key)
    }

    // =========================================================================
    // Snapshot capture / restore
    // =========================================================================

    /// Read every artifact inside the rollback boundary into an owned,
    /// independent copy.
    pub async fn capture_snapshot(&self) -> Result<LedgerSnapshot, sqlx::Error> {
        let positions = sqlx::query(
            "SELECT ticker, shares, cost_basis, stop_loss, market_price, market_value, unrealized_pnl \
             FROM positions ORDER BY ticker ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| PositionRow {
            ticker: row.get("ticker"),
            shares: row.get("shares"),
            cost_basis: row.get("cost_basis"),
            stop_loss: row.get("stop_loss"),
            market_price: row.get("market_price"),
            market_value: row.get("market_value"),
            unrealized_pnl: row.get("unrealized_pnl"),
        })
        .collect();

        let meta = sqlx::query("SELECT key, value FROM portfolio_meta ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect();

        let portfolio_history = sqlx::query(
            "SELECT id, date, cash, equity, positions_value, daily_return_pct, overall_return_pct \
             FROM portfolio_history ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| PortfolioHistoryRecord {
            id: row.get("id"),
            date: row.get("date"),
            cash: row.get("cash"),
            equity: row.get("equity"),
            positions_value: row.get("positions_value"),
            daily_return_pct: row.get("daily_return_pct"),
            overall_return_pct: row.get("overall_return_pct"),
        })
        .collect();

        let position_history = sqlx::query(
            "SELECT id, date, ticker, shares, avg_cost, stop_loss, market_price, market_value, unrealized_pnl \
             FROM position_history ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| PositionHistoryRecord {
            id: row.get("id"),
            date: row.get("date"),
            ticker: row.get("ticker"),
            shares: row.get("shares"),
            avg_cost: row.get("avg_cost"),
            stop_loss: row.get("stop_loss"),
            market_price: row.get("market_price"),
            market_value: row.get("market_value"),
            unrealized_pnl: row.get("unrealized_pnl"),
        })
        .collect();

        let trade_log = sqlx::query(
            "SELECT id, date, ticker, action, shares, fill_price, realized_pnl, status, reason \
             FROM trade_log ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| TradeLogRecord {
            id: row.get("id"),
            date: row.get("date"),
            ticker: row.get("ticker"),
            action: row.get("action"),
            shares: row.get("shares"),
            fill_price: row.get("fill_price"),
            realized_pnl: row.get("realized_pnl"),
            status: row.get("status"),
            reason: row.get("reason"),
        })
        .collect();

        let pending_orders = sqlx::query("SELECT id, payload FROM pending_orders ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| (row.get("id"), row.get("payload")))
            .collect();

        Ok(LedgerSnapshot {
            positions,
            meta,
            portfolio_history,
            position_history,
            trade_log,
            pending_orders,
        })
    }

    /// Overwrite every artifact inside the rollback boundary with the
    /// snapshot's contents, in a single transaction: either every table is
    /// restored or none is.
    pub async fn restore_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "positions",
            "portfolio_meta",
            "portfolio_history",
            "position_history",
            "trade_log",
            "pending_orders",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        for row in &snapshot.positions {
            sqlx::query(
                "INSERT INTO positions \
                 (ticker, shares, cost_basis, stop_loss, market_price, market_value, unrealized_pnl) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.ticker)
            .bind(row.shares)
            .bind(&row.cost_basis)
            .bind(&row.stop_loss)
            .bind(&row.market_price)
            .bind(&row.market_value)
            .bind(&row.unrealized_pnl)
            .execute(&mut *tx)
            .await?;
        }

        for (key, value) in &snapshot.meta {
            sqlx::query("INSERT INTO portfolio_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        for row in &snapshot.portfolio_history {
            sqlx::query(
                "INSERT INTO portfolio_history \
                 (id, date, cash, equity, positions_value, daily_return_pct, overall_return_pct) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.date)
            .bind(&row.cash)
            .bind(&row.equity)
            .bind(&row.positions_value)
            .bind(&row.daily_return_pct)
            .bind(&row.overall_return_pct)
            .execute(&mut *tx)
            .await?;
        }

        for row in &snapshot.position_history {
            sqlx::query(
                "INSERT INTO position_history \
                 (id, date, ticker, shares, avg_cost, stop_loss, market_price, market_value, unrealized_pnl) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.date)
            .bind(&row.ticker)
            .bind(row.shares)
            .bind(&row.avg_cost)
            .bind(&row.stop_loss)
            .bind(&row.market_price)
            .bind(&row.market_value)
            .bind(&row.unrealized_pnl)
            .execute(&mut *tx)
            .await?;
        }

        for row in &snapshot.trade_log {
            sqlx::query(
                "INSERT INTO trade_log \
                 (id, date, ticker, action, shares, fill_price, realized_pnl, status, reason) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.date)
            .bind(&row.ticker)
            .bind(&row.action)
            .bind(row.shares)
            .bind(&row.fill_price)
            .bind(&row.realized_pnl)
            .bind(&row.status)
            .bind(&row.reason)
            .execute(&mut *tx)
            .await?;
        }

        for (id, payload) in &snapshot.pending_orders {
            sqlx::query("INSERT INTO pending_orders (id, payload) VALUES (?, ?)")
                .bind(id)
                .bind(payload)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Operator reset
    // =========================================================================

    /// Delete every ledger artifact (run log included) and re-seed cash.
    /// The caller is responsible for operator confirmation.
    pub async fn reset_all(&self, starting_cash: Decimal) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "positions",
            "portfolio_meta",
            "portfolio_history",
            "position_history",
            "trade_log",
            "pending_orders",
            "run_log",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        for key in [META_CASH, META_STARTING_CASH] {
            sqlx::query("INSERT INTO portfolio_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(starting_cash.to_canonical_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Parse a stored canonical decimal, surfacing corruption as a decode error.
pub(crate) fn decode_decimal(raw: &str, context: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str_canonical(raw).map_err(|e| {
        sqlx::Error::Decode(format!("invalid decimal '{}' in {}: {}", raw, context, e).into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("ledger.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_seed_and_read_cash() {
        let (repo, _temp) = setup_repo().await;
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();

        assert_eq!(
            repo.get_cash().await.unwrap(),
            Decimal::from_str("10000").unwrap()
        );
        assert_eq!(
            repo.get_starting_cash().await.unwrap(),
            Decimal::from_str("10000").unwrap()
        );
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (repo, _temp) = setup_repo().await;
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();
        repo.set_cash(Decimal::from_str("510").unwrap()).await.unwrap();

        // Re-seeding must not clobber established balances.
        repo.ensure_seeded(Decimal::from_str("99999").unwrap())
            .await
            .unwrap();
        assert_eq!(
            repo.get_cash().await.unwrap(),
            Decimal::from_str("510").unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_meta_key_is_decode_error() {
        let (repo, _temp) = setup_repo().await;
        let err = repo.get_cash().await.unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_empty_ledger() {
        let (repo, _temp) = setup_repo().await;
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();

        let before = repo.capture_snapshot().await.unwrap();
        repo.restore_snapshot(&before).await.unwrap();
        let after = repo.capture_snapshot().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_restore_erases_rows_added_after_capture() {
        let (repo, _temp) = setup_repo().await;
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();
        let snapshot = repo.capture_snapshot().await.unwrap();

        sqlx::query("INSERT INTO trade_log (date, ticker, action, status) VALUES ('2026-03-02', 'AAPL', 'BUY', 'FILLED')")
            .execute(repo.pool())
            .await
            .unwrap();
        repo.set_cash(Decimal::from_str("1").unwrap()).await.unwrap();

        repo.restore_snapshot(&snapshot).await.unwrap();
        let restored = repo.capture_snapshot().await.unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(
            repo.get_cash().await.unwrap(),
            Decimal::from_str("10000").unwrap()
        );
    }

    #[tokio::test]
    async fn test_reset_all_clears_and_reseeds() {
        let (repo, _temp) = setup_repo().await;
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();
        repo.set_cash(Decimal::from_str("42").unwrap()).await.unwrap();

        repo.reset_all(Decimal::from_str("5000").unwrap())
            .await
            .unwrap();
        assert_eq!(
            repo.get_cash().await.unwrap(),
            Decimal::from_str("5000").unwrap()
        );
        assert_eq!(
            repo.get_starting_cash().await.unwrap(),
            Decimal::from_str("5000").unwrap()
        );
    }

    #[tokio::test]
    async fn test_decode_decimal_rejects_garbage() {
        assert!(decode_decimal("12.5", "test").is_ok());
        assert!(decode_decimal("not-a-number", "test").is_err());
    }
}
