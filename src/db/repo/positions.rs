//! Current portfolio state: positions table plus the cash scalar.

use crate::domain::{Decimal, Portfolio, Position, Ticker};
use sqlx::Row;

use super::{decode_decimal, Repository, META_CASH};

impl Repository {
    /// Load all open positions.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored decimal is corrupt.
    pub async fn load_positions(&self) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT ticker, shares, cost_basis, stop_loss, market_price, market_value, unrealized_pnl \
             FROM positions ORDER BY ticker ASC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            let ticker: String = row.get("ticker");
            let shares: i64 = row.get("shares");
            let cost_basis: String = row.get("cost_basis");

            let shares = u32::try_from(shares).map_err(|_| {
                sqlx::Error::Decode(
                    format!("position {} has invalid share count {}", ticker, shares).into(),
                )
            })?;

            positions.push(Position {
                ticker: Ticker::new(&ticker),
                shares,
                cost_basis: decode_decimal(&cost_basis, "positions.cost_basis")?,
                stop_loss: decode_optional(row.get("stop_loss"), "positions.stop_loss")?,
                market_price: decode_optional(row.get("market_price"), "positions.market_price")?,
                market_value: decode_optional(row.get("market_value"), "positions.market_value")?,
                unrealized_pnl: decode_optional(
                    row.get("unrealized_pnl"),
                    "positions.unrealized_pnl",
                )?,
            });
        }
        Ok(positions)
    }

    /// Load the full current state: positions plus cash.
    pub async fn load_portfolio(&self) -> Result<Portfolio, sqlx::Error> {
        let positions = self.load_positions().await?;
        let cash = self.get_cash().await?;
        Ok(Portfolio::from_rows(positions, cash))
    }

    /// Overwrite the cash balance (full precision).
    pub async fn set_cash(&self, cash: Decimal) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO portfolio_meta (key, value) VALUES (?, ?)")
            .bind(META_CASH)
            .bind(cash.to_canonical_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Persist the in-memory portfolio as the new current state, replacing
    /// the positions table and the cash scalar in one transaction.
    ///
    /// Cost basis keeps full precision (it feeds future weighted-average
    /// merges); the derived market columns are rounded to cents.
    pub async fn persist_portfolio(&self, portfolio: &Portfolio) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM positions").execute(&mut *tx).await?;
        for position in portfolio.positions() {
            sqlx::query(
                "INSERT INTO positions \
                 (ticker, shares, cost_basis, stop_loss, market_price, market_value, unrealized_pnl) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position.ticker.as_str())
            .bind(position.shares as i64)
            .bind(position.cost_basis.to_canonical_string())
            .bind(position.stop_loss.map(|d| d.to_canonical_string()))
            .bind(
                position
                    .market_price
                    .map(|d| d.round_money().to_canonical_string()),
            )
            .bind(
                position
                    .market_value
                    .map(|d| d.round_money().to_canonical_string()),
            )
            .bind(
                position
                    .unrealized_pnl
                    .map(|d| d.round_money().to_canonical_string()),
            )
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("INSERT OR REPLACE INTO portfolio_meta (key, value) VALUES (?, ?)")
            .bind(META_CASH)
            .bind(portfolio.cash.to_canonical_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn decode_optional(raw: Option<String>, context: &str) -> Result<Option<Decimal>, sqlx::Error> {
    raw.map(|s| decode_decimal(&s, context)).transpose()
}
