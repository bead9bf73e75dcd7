use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use paperledger::marketdata::{FallbackMarketData, MarketData, StooqMarketData};
use paperledger::{init_db, process_one_day, Config, Repository, RunError, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Daily paper-trading ledger: processes one trading day atomically.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending orders, revalue positions, and append history for one day.
    Process(ProcessArgs),
    /// Replace the pending-orders queue from a JSON file.
    Submit(SubmitArgs),
    /// Delete all ledger state and re-seed the starting cash.
    Reset(ResetArgs),
}

#[derive(Parser)]
struct ProcessArgs {
    /// The trading day to process (format: YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Parser)]
struct SubmitArgs {
    /// Path to a JSON file shaped as {"orders": [...]}.
    #[arg(long)]
    file: PathBuf,
}

#[derive(Parser)]
struct ResetArgs {
    /// Confirm the irreversible deletion of every ledger artifact.
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize ledger database: {}", e);
            return ExitCode::from(2);
        }
    };
    let repo = Arc::new(Repository::new(pool));

    let cli = Cli::parse();
    match cli.command {
        Commands::Process(args) => handle_process(args, repo, &config).await,
        Commands::Submit(args) => match handle_submit(args, repo).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Submit failed: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Reset(args) => match handle_reset(args, repo, &config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Reset failed: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// Exit status reflects the run outcome: 0 committed (or market closed),
/// 1 rolled back, 2 the ledger itself is suspect.
async fn handle_process(args: ProcessArgs, repo: Arc<Repository>, config: &Config) -> ExitCode {
    if let Err(e) = repo.ensure_seeded(config.starting_cash).await {
        eprintln!("Failed to seed ledger: {}", e);
        return ExitCode::from(2);
    }

    let market_data: Arc<dyn MarketData> = Arc::new(FallbackMarketData::new(vec![Arc::new(
        StooqMarketData::new(config.market_data_url.clone()),
    )]));

    let today = Utc::now().date_naive();
    let run_date = args.date.unwrap_or(today);

    match process_one_day(repo, market_data, run_date, today).await {
        Ok(summary) => {
            match summary.status {
                RunStatus::Skipped => println!("{}: market closed, nothing to do", run_date),
                _ => println!(
                    "{}: committed ({} filled, {} failed, {} rejected, {} deferred)",
                    run_date,
                    summary.counters.filled,
                    summary.counters.failed,
                    summary.counters.rejected,
                    summary.counters.deferred
                ),
            }
            ExitCode::SUCCESS
        }
        Err(e @ RunError::RollbackFailed { .. }) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn handle_submit(args: SubmitArgs, repo: Arc<Repository>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&raw).context("parsing orders JSON")?;
    let orders = document
        .get("orders")
        .and_then(|v| v.as_array())
        .context("expected a top-level \"orders\" array")?;

    let payloads: Vec<String> = orders.iter().map(|order| order.to_string()).collect();
    let count = payloads.len();
    repo.replace_pending_payloads(&payloads).await?;
    println!("Queued {} order(s)", count);
    Ok(())
}

async fn handle_reset(
    args: ResetArgs,
    repo: Arc<Repository>,
    config: &Config,
) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!("reset deletes every ledger artifact; re-run with --yes to confirm");
    }
    repo.reset_all(config.starting_cash).await?;
    println!(
        "Ledger reset; cash re-seeded at {}",
        config.starting_cash.round_money()
    );
    Ok(())
}
