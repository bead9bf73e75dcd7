//! Snapshot manager: the all-or-nothing boundary around one run.
//!
//! A two-state machine (`Idle` ⇄ `RunInProgress`) guarding an owned deep
//! copy of the ledger. The copy is independent of the live store: nothing
//! written during the run is visible through it. On success it is
//! discarded; on failure it is consumed by the restore.

use crate::db::{LedgerSnapshot, Repository};
use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Idle,
    RunInProgress,
}

/// Guards capture/commit/rollback ordering for a single run at a time.
#[derive(Debug)]
pub struct SnapshotManager {
    state: SnapshotState,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self {
            state: SnapshotState::Idle,
        }
    }

    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Capture the full ledger into an owned snapshot and enter
    /// `RunInProgress`.
    ///
    /// # Errors
    /// A capture while a run is already in progress is a contract
    /// violation; storage failures pass through.
    pub async fn capture(&mut self, repo: &Repository) -> Result<LedgerSnapshot, RunError> {
        if self.state == SnapshotState::RunInProgress {
            return Err(RunError::ContractViolation(
                "snapshot capture requested while a run is already in progress".to_string(),
            ));
        }
        let snapshot = repo.capture_snapshot().await?;
        self.state = SnapshotState::RunInProgress;
        Ok(snapshot)
    }

    /// Discard the snapshot after a successful run and return to `Idle`.
    pub fn commit(&mut self) -> Result<(), RunError> {
        if self.state != SnapshotState::RunInProgress {
            return Err(RunError::ContractViolation(
                "snapshot commit without a run in progress".to_string(),
            ));
        }
        self.state = SnapshotState::Idle;
        Ok(())
    }

    /// Overwrite every ledger artifact with the snapshot's contents and
    /// return to `Idle`. The snapshot is consumed.
    ///
    /// # Errors
    /// A restore failure is terminal for the ledger: there is no further
    /// fallback, and the caller must surface it as unrecoverable.
    pub async fn rollback(
        &mut self,
        repo: &Repository,
        snapshot: LedgerSnapshot,
    ) -> Result<(), sqlx::Error> {
        self.state = SnapshotState::Idle;
        repo.restore_snapshot(&snapshot).await
    }
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::Decimal;
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
        let repo = Repository::new(pool);
        repo.ensure_seeded(Decimal::from_str("10000").unwrap())
            .await
            .unwrap();
        (repo, temp_dir)
    }

    #[tokio::test]
    async fn test_capture_transitions_to_run_in_progress() {
        let (repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        assert_eq!(manager.state(), SnapshotState::Idle);

        let _snapshot = manager.capture(&repo).await.unwrap();
        assert_eq!(manager.state(), SnapshotState::RunInProgress);
    }

    #[tokio::test]
    async fn test_double_capture_is_contract_violation() {
        let (repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        let _snapshot = manager.capture(&repo).await.unwrap();

        let err = manager.capture(&repo).await.unwrap_err();
        assert!(matches!(err, RunError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn test_commit_requires_run_in_progress() {
        let (_repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        assert!(matches!(
            manager.commit(),
            Err(RunError::ContractViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_returns_to_idle() {
        let (repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        let _snapshot = manager.capture(&repo).await.unwrap();
        manager.commit().unwrap();
        assert_eq!(manager.state(), SnapshotState::Idle);
    }

    #[tokio::test]
    async fn test_snapshot_is_independent_of_live_mutation() {
        let (repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        let snapshot = manager.capture(&repo).await.unwrap();

        // Mutate the live store after capture.
        repo.set_cash(Decimal::from_str("1").unwrap()).await.unwrap();
        repo.replace_pending_payloads(&["{}".to_string()])
            .await
            .unwrap();

        // The captured copy still carries the pre-mutation state.
        let cash_in_snapshot = snapshot
            .meta
            .iter()
            .find(|(key, _)| key == "cash")
            .map(|(_, value)| value.clone());
        assert_eq!(cash_in_snapshot.as_deref(), Some("10000"));
        assert!(snapshot.pending_orders.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_restores_and_returns_to_idle() {
        let (repo, _temp) = setup_repo().await;
        let mut manager = SnapshotManager::new();
        let snapshot = manager.capture(&repo).await.unwrap();

        repo.set_cash(Decimal::from_str("1").unwrap()).await.unwrap();
        manager.rollback(&repo, snapshot).await.unwrap();

        assert_eq!(manager.state(), SnapshotState::Idle);
        assert_eq!(
            repo.get_cash().await.unwrap(),
            Decimal::from_str("10000").unwrap()
        );
    }
}
