//! Run orchestrator: one atomic processing pass for one trading day.
//!
//! Sequences validator → matcher → valuation → history append → persist,
//! wrapped by the snapshot/rollback boundary. Phases advance strictly
//! forward; a failure anywhere after capture restores the pre-run ledger
//! and surfaces a single fatal outcome with the cause attached.

use crate::calendar::is_market_open;
use crate::db::Repository;
use crate::domain::{
    Decimal, RawOrder, RunLogEntry, RunStatus, Ticker, TradeRecord, TradeStatus,
};
use crate::engine::{self, matcher, Disposition};
use crate::error::RunError;
use crate::marketdata::MarketData;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Where a run currently stands. Transitions are strictly sequential; the
/// two terminal phases admit no re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    SnapshotTaken,
    OrdersApplied,
    Valued,
    HistoryAppended,
    Committed,
    RolledBack,
}

/// Per-run order counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub filled: u32,
    pub failed: u32,
    pub rejected: u32,
    pub deferred: u32,
}

/// What a completed (committed or skipped) run reports back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub status: RunStatus,
    pub counters: RunCounters,
    /// End-of-day equity; absent for skipped runs.
    pub equity: Option<Decimal>,
}

/// Processes exactly one trading day for one portfolio, then becomes
/// terminal. Owns the portfolio state for the duration of the run.
pub struct RunOrchestrator {
    repo: Arc<Repository>,
    market_data: Arc<dyn MarketData>,
    snapshots: super::SnapshotManager,
    phase: RunPhase,
}

impl RunOrchestrator {
    pub fn new(repo: Arc<Repository>, market_data: Arc<dyn MarketData>) -> Self {
        Self {
            repo,
            market_data,
            snapshots: super::SnapshotManager::new(),
            phase: RunPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Process all pending orders for `run_date`, revalue the portfolio,
    /// and append the day's history, atomically.
    ///
    /// `today` is injected rather than read from the clock so the
    /// future-date guard is testable.
    ///
    /// # Errors
    /// Any fatal failure after the snapshot was taken rolls the ledger
    /// back and returns [`RunError::RolledBack`] with the cause attached;
    /// [`RunError::RollbackFailed`] means the ledger itself is suspect.
    pub async fn process_day(
        &mut self,
        run_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<RunSummary, RunError> {
        if self.phase != RunPhase::NotStarted {
            return Err(RunError::ContractViolation(format!(
                "process_day called in phase {:?}; a run orchestrator is single-use",
                self.phase
            )));
        }
        if run_date > today {
            return Err(RunError::FutureRunDate { run_date, today });
        }

        let started_at = Utc::now();

        if !is_market_open(run_date) {
            info!(%run_date, "Market closed; skipping run without mutation");
            self.phase = RunPhase::Committed;
            let summary = RunSummary {
                date: run_date,
                status: RunStatus::Skipped,
                counters: RunCounters::default(),
                equity: None,
            };
            self.write_run_log(&summary, started_at, false, None).await?;
            return Ok(summary);
        }

        let snapshot = self.snapshots.capture(&self.repo).await?;
        self.phase = RunPhase::SnapshotTaken;

        match self.execute(run_date).await {
            Ok((counters, equity)) => {
                self.snapshots.commit()?;
                self.phase = RunPhase::Committed;
                let summary = RunSummary {
                    date: run_date,
                    status: RunStatus::Success,
                    counters,
                    equity: Some(equity),
                };
                self.write_run_log(&summary, started_at, true, None).await?;
                info!(
                    %run_date,
                    filled = counters.filled,
                    failed = counters.failed,
                    rejected = counters.rejected,
                    deferred = counters.deferred,
                    "Run committed"
                );
                Ok(summary)
            }
            Err(cause) => {
                warn!(%run_date, phase = ?self.phase, error = %cause, "Run failed; rolling back");
                match self.snapshots.rollback(&self.repo, snapshot).await {
                    Ok(()) => {
                        self.phase = RunPhase::RolledBack;
                        let summary = RunSummary {
                            date: run_date,
                            status: RunStatus::Failure,
                            counters: RunCounters::default(),
                            equity: None,
                        };
                        if let Err(log_err) = self
                            .write_run_log(&summary, started_at, true, Some(cause.to_string()))
                            .await
                        {
                            warn!(error = %log_err, "Failed to record FAILURE run-log row");
                        }
                        Err(RunError::RolledBack {
                            source: Box::new(cause),
                        })
                    }
                    Err(restore_err) => {
                        self.phase = RunPhase::RolledBack;
                        Err(RunError::RollbackFailed {
                            detail: restore_err.to_string(),
                            cause: cause.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// The fallible middle of the run: everything between capture and
    /// commit. Any error here triggers rollback in `process_day`.
    async fn execute(&mut self, run_date: NaiveDate) -> Result<(RunCounters, Decimal), RunError> {
        let mut portfolio = self.repo.load_portfolio().await?;
        let payloads = self.repo.load_pending_payloads().await?;

        let mut counters = RunCounters::default();
        let mut carried: Vec<String> = Vec::new();

        for payload in payloads {
            let raw: RawOrder = match serde_json::from_str(&payload) {
                Ok(raw) => raw,
                Err(e) => {
                    let record = TradeRecord::rejected(
                        run_date,
                        String::new(),
                        "UNKNOWN".to_string(),
                        format!("unparseable order payload: {}", e),
                    );
                    self.repo.append_trade_record(&record).await?;
                    counters.rejected += 1;
                    continue;
                }
            };

            match engine::validate(&raw, run_date) {
                Disposition::Accept(order) => {
                    let quote = self
                        .market_data
                        .get_quote(&order.ticker, run_date)
                        .await?;
                    let record = matcher::apply(&mut portfolio, &order, &quote);
                    match record.status {
                        TradeStatus::Filled => counters.filled += 1,
                        TradeStatus::Failed => counters.failed += 1,
                        TradeStatus::Rejected => counters.rejected += 1,
                    }
                    self.repo.append_trade_record(&record).await?;
                }
                Disposition::CarryForward => {
                    counters.deferred += 1;
                    carried.push(payload);
                }
                Disposition::Reject(rejection) => {
                    let record = TradeRecord::rejected(
                        raw.execution_date().unwrap_or(run_date),
                        raw.ticker_label(),
                        raw.action_label(),
                        rejection.reason,
                    );
                    self.repo.append_trade_record(&record).await?;
                    counters.rejected += 1;
                }
            }
        }

        self.repo.replace_pending_payloads(&carried).await?;
        self.phase = RunPhase::OrdersApplied;

        // Revalue every open position against the day's close.
        let held: Vec<Ticker> = portfolio.positions().map(|p| p.ticker.clone()).collect();
        for ticker in held {
            let quote = self.market_data.get_quote(&ticker, run_date).await?;
            portfolio.refresh_market(&ticker, quote.close);
        }
        self.repo.persist_portfolio(&portfolio).await?;
        self.phase = RunPhase::Valued;

        let prior_equity = self.repo.latest_equity().await?;
        let starting_cash = self.repo.get_starting_cash().await?;
        let report = engine::build_daily_report(&portfolio, run_date, prior_equity, starting_cash)?;
        self.repo.append_portfolio_history(&report.portfolio_row).await?;
        self.repo.append_position_history(&report.position_rows).await?;
        self.phase = RunPhase::HistoryAppended;

        Ok((counters, report.equity()))
    }

    async fn write_run_log(
        &self,
        summary: &RunSummary,
        started_at: DateTime<Utc>,
        market_open: bool,
        error: Option<String>,
    ) -> Result<(), RunError> {
        let entry = RunLogEntry {
            date: summary.date,
            weekday: summary.date.format("%A").to_string(),
            started_at,
            finished_at: Utc::now(),
            market_open,
            status: summary.status,
            orders_filled: summary.counters.filled,
            orders_failed: summary.counters.failed,
            orders_rejected: summary.counters.rejected,
            orders_deferred: summary.counters.deferred,
            equity: summary.equity,
            error,
        };
        self.repo.append_run_log(&entry).await?;
        Ok(())
    }
}

/// Process one day with a fresh, single-use orchestrator. The portfolio is
/// exclusively owned by that orchestrator for the run's duration.
pub async fn process_one_day(
    repo: Arc<Repository>,
    market_data: Arc<dyn MarketData>,
    run_date: NaiveDate,
    today: NaiveDate,
) -> Result<RunSummary, RunError> {
    RunOrchestrator::new(repo, market_data)
        .process_day(run_date, today)
        .await
}
