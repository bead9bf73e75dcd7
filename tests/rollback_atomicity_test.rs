//! Atomicity tests: any fatal failure after the snapshot is taken must
//! leave the on-disk ledger exactly as it was before the run began.

use chrono::NaiveDate;
use paperledger::db::migrations::init_db;
use paperledger::domain::{Decimal, MarketQuote, Portfolio, RunStatus, Ticker};
use paperledger::error::RunError;
use paperledger::marketdata::{MarketData, MockMarketData};
use paperledger::run::{RunOrchestrator, RunPhase};
use paperledger::Repository;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn quote(ticker: &str, open: &str, high: &str, low: &str, close: &str) -> MarketQuote {
    MarketQuote {
        ticker: Ticker::new(ticker),
        open: dec(open),
        high: dec(high),
        low: dec(low),
        close: dec(close),
        volume: 1_000_000,
    }
}

fn buy_payload(ticker: &str, shares: u32, limit: f64, stop: f64) -> String {
    serde_json::json!({
        "action": "buy",
        "ticker": ticker,
        "shares": shares,
        "order_type": "limit",
        "limit_price": limit,
        "stop_loss": stop,
        "date": "2026-03-02"
    })
    .to_string()
}

async fn setup_repo(starting_cash: &str) -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("ledger.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    repo.ensure_seeded(dec(starting_cash)).await.unwrap();
    (repo, temp_dir)
}

#[tokio::test]
async fn test_valuation_failure_after_fills_restores_everything() {
    let (repo, _temp) = setup_repo("10000").await;

    // A pre-existing holding with no quote for the day: both buys will fill,
    // then valuation of GME fails and the whole run must unwind.
    let mut seeded = Portfolio::new(dec("5000"));
    seeded.add_or_merge(&Ticker::new("GME"), 7, dec("20"), dec("15"));
    repo.persist_portfolio(&seeded).await.unwrap();

    repo.replace_pending_payloads(&[
        buy_payload("AAPL", 10, 50.0, 40.0),
        buy_payload("MSFT", 5, 110.0, 90.0),
    ])
    .await
    .unwrap();

    let before = repo.capture_snapshot().await.unwrap();

    let market: Arc<dyn MarketData> = Arc::new(
        MockMarketData::new()
            .with_quote(monday(), quote("AAPL", "49", "51", "48", "52"))
            .with_quote(monday(), quote("MSFT", "100", "112", "99", "111")),
    );
    let mut orchestrator = RunOrchestrator::new(repo.clone(), market);
    let err = orchestrator
        .process_day(monday(), monday())
        .await
        .unwrap_err();

    assert_eq!(orchestrator.phase(), RunPhase::RolledBack);
    match &err {
        RunError::RolledBack { source } => {
            assert!(matches!(**source, RunError::MarketData(_)))
        }
        other => panic!("expected RolledBack, got {:?}", other),
    }
    assert!(err.ledger_intact());

    // The ledger is exactly what it was before the run: the two fills left
    // no trace in the trade log, cash, positions, or the pending queue.
    let after = repo.capture_snapshot().await.unwrap();
    assert_eq!(after, before);
    assert!(repo.trade_log_for_date(monday()).await.unwrap().is_empty());
    assert_eq!(repo.get_cash().await.unwrap(), dec("5000"));
    assert_eq!(repo.load_pending_payloads().await.unwrap().len(), 2);

    // The FAILURE row sits outside the rollback boundary and survives.
    let runs = repo.run_log_for_date(monday()).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failure);
    assert!(runs[0].error.as_deref().unwrap().contains("GME"));
}

#[tokio::test]
async fn test_order_quote_outage_rolls_back() {
    let (repo, _temp) = setup_repo("1000").await;
    repo.replace_pending_payloads(&[buy_payload("AAPL", 10, 50.0, 40.0)])
        .await
        .unwrap();
    let before = repo.capture_snapshot().await.unwrap();

    let market: Arc<dyn MarketData> =
        Arc::new(MockMarketData::new().with_network_failure(Ticker::new("AAPL")));
    let err = RunOrchestrator::new(repo.clone(), market)
        .process_day(monday(), monday())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::RolledBack { .. }));
    assert_eq!(repo.capture_snapshot().await.unwrap(), before);
}

#[tokio::test]
async fn test_missing_quote_for_due_order_is_fatal_not_a_rejection() {
    // DataUnavailable is a collaborator failure: the run rolls back rather
    // than logging a FAILED order.
    let (repo, _temp) = setup_repo("1000").await;
    repo.replace_pending_payloads(&[buy_payload("AAPL", 10, 50.0, 40.0)])
        .await
        .unwrap();
    let before = repo.capture_snapshot().await.unwrap();

    let market: Arc<dyn MarketData> = Arc::new(MockMarketData::new());
    let err = RunOrchestrator::new(repo.clone(), market)
        .process_day(monday(), monday())
        .await
        .unwrap_err();

    match err {
        RunError::RolledBack { source } => {
            assert!(matches!(*source, RunError::MarketData(_)))
        }
        other => panic!("expected RolledBack, got {:?}", other),
    }
    assert_eq!(repo.capture_snapshot().await.unwrap(), before);
    assert!(repo.trade_log_for_date(monday()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_orchestrator_is_single_use() {
    let (repo, _temp) = setup_repo("1000").await;
    let market: Arc<dyn MarketData> = Arc::new(
        MockMarketData::new().with_quote(monday(), quote("AAPL", "49", "51", "48", "52")),
    );

    let mut orchestrator = RunOrchestrator::new(repo.clone(), market);
    orchestrator.process_day(monday(), monday()).await.unwrap();
    assert_eq!(orchestrator.phase(), RunPhase::Committed);

    let err = orchestrator
        .process_day(monday(), monday())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::ContractViolation(_)));
}

#[tokio::test]
async fn test_future_run_date_refused_before_snapshot() {
    let (repo, _temp) = setup_repo("1000").await;
    let market: Arc<dyn MarketData> = Arc::new(MockMarketData::new());

    let mut orchestrator = RunOrchestrator::new(repo.clone(), market);
    let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
    let err = orchestrator
        .process_day(tomorrow, monday())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::FutureRunDate { .. }));
    assert_eq!(orchestrator.phase(), RunPhase::NotStarted);
    // Refused outright: not even a run-log row.
    assert!(repo.run_log_for_date(tomorrow).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_day_processing_rolls_back() {
    // The portfolio-history date is UNIQUE: re-processing an already
    // committed day fails and unwinds instead of double-counting.
    let (repo, _temp) = setup_repo("1000").await;
    let market: Arc<dyn MarketData> = Arc::new(
        MockMarketData::new().with_quote(monday(), quote("AAPL", "49", "51", "48", "52")),
    );

    RunOrchestrator::new(repo.clone(), market.clone())
        .process_day(monday(), monday())
        .await
        .unwrap();
    let committed = repo.capture_snapshot().await.unwrap();

    let err = RunOrchestrator::new(repo.clone(), market)
        .process_day(monday(), monday())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::RolledBack { .. }));
    assert_eq!(repo.capture_snapshot().await.unwrap(), committed);
}
