//! Pending-orders queue.
//!
//! Orders are stored as the exact JSON payloads they arrived as, so a
//! future-dated order carried across runs survives byte-for-byte.

use sqlx::Row;

use super::Repository;

impl Repository {
    /// Load the queued order payloads in submission order.
    pub async fn load_pending_payloads(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT payload FROM pending_orders ORDER BY id ASC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(|row| row.get("payload")).collect())
    }

    /// Replace the queue with the given payloads in one transaction.
    ///
    /// Used both by the order source handing in a new batch and by the run
    /// orchestrator writing back the orders it could not satisfy yet.
    pub async fn replace_pending_payloads(&self, payloads: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM pending_orders")
            .execute(&mut *tx)
            .await?;
        for payload in payloads {
            sqlx::query("INSERT INTO pending_orders (payload) VALUES (?)")
                .bind(payload)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
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
    async fn test_queue_starts_empty() {
        let (repo, _temp) = setup_repo().await;
        assert!(repo.load_pending_payloads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_preserves_order_and_bytes() {
        let (repo, _temp) = setup_repo().await;
        let payloads = vec![
            r#"{"action":"buy","ticker":"AAPL","unknown_field":1}"#.to_string(),
            r#"{"action":"sell","ticker":"MSFT"}"#.to_string(),
        ];
        repo.replace_pending_payloads(&payloads).await.unwrap();
        assert_eq!(repo.load_pending_payloads().await.unwrap(), payloads);
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_queue() {
        let (repo, _temp) = setup_repo().await;
        repo.replace_pending_payloads(&["{}".to_string()])
            .await
            .unwrap();
        repo.replace_pending_payloads(&[]).await.unwrap();
        assert!(repo.load_pending_payloads().await.unwrap().is_empty());
    }
}
