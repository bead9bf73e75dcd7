//! Append-only history tables and the run log.
//!
//! Rounding to cents happens here, at the point of persistence; the
//! in-memory rows handed in keep whatever precision the computation
//! produced.

use crate::domain::{
    Decimal, PortfolioHistoryRow, PositionHistoryRow, RunLogEntry, RunStatus, Ticker, TradeRecord,
    TradeStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use super::{decode_decimal, Repository};

const DATE_FMT: &str = "%Y-%m-%d";

impl Repository {
    // =========================================================================
    // Trade log
    // =========================================================================

    /// Append one trade-log row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn append_trade_record(&self, record: &TradeRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO trade_log (date, ticker, action, shares, fill_price, realized_pnl, status, reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.date.format(DATE_FMT).to_string())
        .bind(&record.ticker)
        .bind(&record.action)
        .bind(record.shares.map(|s| s as i64))
        .bind(record.fill_price.map(|d| d.round_money().to_canonical_string()))
        .bind(record.realized_pnl.map(|d| d.round_money().to_canonical_string()))
        .bind(record.status.as_str())
        .bind(&record.reason)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Trade-log rows for one date, in insertion order.
    pub async fn trade_log_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<TradeRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT date, ticker, action, shares, fill_price, realized_pnl, status, reason \
             FROM trade_log WHERE date = ? ORDER BY id ASC",
        )
        .bind(date.format(DATE_FMT).to_string())
        .fetch_all(self.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status_raw: String = row.get("status");
            let status = TradeStatus::parse(&status_raw).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown trade status '{}'", status_raw).into())
            })?;
            records.push(TradeRecord {
                date: parse_date(&row.get::<String, _>("date"))?,
                ticker: row.get("ticker"),
                action: row.get("action"),
                shares: row
                    .get::<Option<i64>, _>("shares")
                    .map(|s| s as u32),
                fill_price: decode_optional(row.get("fill_price"), "trade_log.fill_price")?,
                realized_pnl: decode_optional(row.get("realized_pnl"), "trade_log.realized_pnl")?,
                status,
                reason: row.get("reason"),
            });
        }
        Ok(records)
    }

    // =========================================================================
    // Portfolio history
    // =========================================================================

    /// Append the daily portfolio-history row. The date column is UNIQUE, so
    /// appending the same day twice fails rather than double-counting.
    pub async fn append_portfolio_history(
        &self,
        row: &PortfolioHistoryRow,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO portfolio_history (date, cash, equity, positions_value, daily_return_pct, overall_return_pct) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.date.format(DATE_FMT).to_string())
        .bind(row.cash.round_money().to_canonical_string())
        .bind(row.equity.round_money().to_canonical_string())
        .bind(row.positions_value.round_money().to_canonical_string())
        .bind(row.daily_return_pct.map(|d| d.round_money().to_canonical_string()))
        .bind(row.overall_return_pct.round_money().to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Equity of the most recent history row, if any.
    pub async fn latest_equity(&self) -> Result<Option<Decimal>, sqlx::Error> {
        let row = sqlx::query("SELECT equity FROM portfolio_history ORDER BY id DESC LIMIT 1")
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| decode_decimal(&r.get::<String, _>("equity"), "portfolio_history.equity"))
            .transpose()
    }

    /// All portfolio-history rows in insertion order.
    pub async fn portfolio_history(&self) -> Result<Vec<PortfolioHistoryRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT date, cash, equity, positions_value, daily_return_pct, overall_return_pct \
             FROM portfolio_history ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            history.push(PortfolioHistoryRow {
                date: parse_date(&row.get::<String, _>("date"))?,
                cash: decode_decimal(&row.get::<String, _>("cash"), "portfolio_history.cash")?,
                equity: decode_decimal(&row.get::<String, _>("equity"), "portfolio_history.equity")?,
                positions_value: decode_decimal(
                    &row.get::<String, _>("positions_value"),
                    "portfolio_history.positions_value",
                )?,
                daily_return_pct: decode_optional(
                    row.get("daily_return_pct"),
                    "portfolio_history.daily_return_pct",
                )?,
                overall_return_pct: decode_decimal(
                    &row.get::<String, _>("overall_return_pct"),
                    "portfolio_history.overall_return_pct",
                )?,
            });
        }
        Ok(history)
    }

    // =========================================================================
    // Position history
    // =========================================================================

    /// Append the per-position daily snapshot rows in one transaction.
    pub async fn append_position_history(
        &self,
        rows: &[PositionHistoryRow],
    ) -> Result<(), sqlx::Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO position_history \
                 (date, ticker, shares, avg_cost, stop_loss, market_price, market_value, unrealized_pnl) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.date.format(DATE_FMT).to_string())
            .bind(row.ticker.as_str())
            .bind(row.shares as i64)
            .bind(row.avg_cost.round_money().to_canonical_string())
            .bind(row.stop_loss.map(|d| d.to_canonical_string()))
            .bind(row.market_price.round_money().to_canonical_string())
            .bind(row.market_value.round_money().to_canonical_string())
            .bind(row.unrealized_pnl.round_money().to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Position-history rows for one date, in ticker order.
    pub async fn position_history_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PositionHistoryRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT date, ticker, shares, avg_cost, stop_loss, market_price, market_value, unrealized_pnl \
             FROM position_history WHERE date = ? ORDER BY ticker ASC",
        )
        .bind(date.format(DATE_FMT).to_string())
        .fetch_all(self.pool())
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let shares: i64 = row.get("shares");
            history.push(PositionHistoryRow {
                date: parse_date(&row.get::<String, _>("date"))?,
                ticker: Ticker::new(&row.get::<String, _>("ticker")),
                shares: shares as u32,
                avg_cost: decode_decimal(
                    &row.get::<String, _>("avg_cost"),
                    "position_history.avg_cost",
                )?,
                stop_loss: decode_optional(row.get("stop_loss"), "position_history.stop_loss")?,
                market_price: decode_decimal(
                    &row.get::<String, _>("market_price"),
                    "position_history.market_price",
                )?,
                market_value: decode_decimal(
                    &row.get::<String, _>("market_value"),
                    "position_history.market_value",
                )?,
                unrealized_pnl: decode_decimal(
                    &row.get::<String, _>("unrealized_pnl"),
                    "position_history.unrealized_pnl",
                )?,
            });
        }
        Ok(history)
    }

    // =========================================================================
    // Run log
    // =========================================================================

    /// Append one run-summary row. Deliberately outside any snapshot.
    pub async fn append_run_log(&self, entry: &RunLogEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO run_log \
             (date, weekday, started_at, finished_at, market_open, status, \
              orders_filled, orders_failed, orders_rejected, orders_deferred, equity, error) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.date.format(DATE_FMT).to_string())
        .bind(&entry.weekday)
        .bind(entry.started_at.to_rfc3339())
        .bind(entry.finished_at.to_rfc3339())
        .bind(entry.market_open as i64)
        .bind(entry.status.as_str())
        .bind(entry.orders_filled as i64)
        .bind(entry.orders_failed as i64)
        .bind(entry.orders_rejected as i64)
        .bind(entry.orders_deferred as i64)
        .bind(entry.equity.map(|d| d.round_money().to_canonical_string()))
        .bind(&entry.error)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Run-log rows for one date, in insertion order.
    pub async fn run_log_for_date(&self, date: NaiveDate) -> Result<Vec<RunLogEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT date, weekday, started_at, finished_at, market_open, status, \
                    orders_filled, orders_failed, orders_rejected, orders_deferred, equity, error \
             FROM run_log WHERE date = ? ORDER BY id ASC",
        )
        .bind(date.format(DATE_FMT).to_string())
        .fetch_all(self.pool())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let status_raw: String = row.get("status");
            let status = RunStatus::parse(&status_raw).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown run status '{}'", status_raw).into())
            })?;
            entries.push(RunLogEntry {
                date: parse_date(&row.get::<String, _>("date"))?,
                weekday: row.get("weekday"),
                started_at: parse_timestamp(&row.get::<String, _>("started_at"))?,
                finished_at: parse_timestamp(&row.get::<String, _>("finished_at"))?,
                market_open: row.get::<i64, _>("market_open") != 0,
                status,
                orders_filled: row.get::<i64, _>("orders_filled") as u32,
                orders_failed: row.get::<i64, _>("orders_failed") as u32,
                orders_rejected: row.get::<i64, _>("orders_rejected") as u32,
                orders_deferred: row.get::<i64, _>("orders_deferred") as u32,
                equity: decode_optional(row.get("equity"), "run_log.equity")?,
                error: row.get("error"),
            });
        }
        Ok(entries)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| sqlx::Error::Decode(format!("invalid stored date '{}': {}", raw, e).into()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            sqlx::Error::Decode(format!("invalid stored timestamp '{}': {}", raw, e).into())
        })
}

fn decode_optional(raw: Option<String>, context: &str) -> Result<Option<Decimal>, sqlx::Error> {
    raw.map(|s| decode_decimal(&s, context)).transpose()
}
