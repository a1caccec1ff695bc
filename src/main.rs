use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use pixflow::application::assistant::Assistant;
use pixflow::application::orchestrator::TransferOrchestrator;
use pixflow::application::scheduler::ScheduledTransfers;
use pixflow::config::AppConfig;
use pixflow::domain::clock::{Clock, FixedClock, SystemClock};
use pixflow::domain::funding::FundingSource;
use pixflow::domain::key::{detect_key_type, display_value};
use pixflow::domain::ports::StoreHandle;
use pixflow::domain::transfer::TransferRequest;
use pixflow::infrastructure::cache::TtlCache;
use pixflow::infrastructure::http_clients::{
    AgentClient, ProfileClient, TransactionsClient, build_client,
};
use pixflow::infrastructure::in_memory::InMemoryStore;
use pixflow::infrastructure::resilience::Resilience;
use pixflow::infrastructure::seed::SeedData;
use pixflow::interfaces::http::dto::{TransferResponse, parse_key_type};
use pixflow::interfaces::http::{self, AppState};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,

    /// Submit one instant transfer and print the result as JSON.
    Transfer {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        source_account: String,
        /// Payee key value.
        #[arg(long)]
        key: String,
        /// Payee key type; inferred from the value when omitted.
        #[arg(long)]
        key_type: Option<String>,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        memo: Option<String>,
        /// Defaults to a fresh UUID.
        #[arg(long)]
        idempotency_key: Option<String>,
        /// Fund from this credit line instead of the balance.
        #[arg(long)]
        credit_line: Option<String>,
        #[arg(long)]
        installments: Option<i32>,
    },

    /// Execute scheduled transfers due on or before DATE (default: today).
    RunScheduled {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the inferred type and display form of a key value.
    DetectKey { value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    pixflow::logging::init_logging(&config.log_level, config.log_json).into_diagnostic()?;

    match cli.command {
        Command::DetectKey { value } => {
            match detect_key_type(&value) {
                Some(key_type) => println!("{key_type} {}", display_value(key_type, &value)),
                None => println!("unknown {value}"),
            }
            Ok(())
        }
        Command::Serve => {
            let store = open_store(&config).await?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let assistant = build_assistant(&config, clock.clone())?;
            let state = AppState::new(store, clock, assistant);
            http::serve(&config.listen_addr(), state).await?;
            Ok(())
        }
        Command::Transfer {
            customer,
            source_account,
            key,
            key_type,
            amount,
            memo,
            idempotency_key,
            credit_line,
            installments,
        } => {
            let store = open_store(&config).await?;
            let orchestrator = TransferOrchestrator::new(store, Arc::new(SystemClock));
            let funding_source = credit_line.as_ref().map(|_| FundingSource::CreditLine);
            let request = TransferRequest {
                idempotency_key: idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string()),
                source_account_id: source_account,
                destination_key_type: parse_key_type("key_type", key_type.as_deref())?,
                destination_key_value: key,
                amount,
                memo,
                funding_source,
                credit_line_id: credit_line,
                installments,
                fee_rate: None,
            };
            let transfer = orchestrator.submit(&customer, request).await?;
            let output =
                serde_json::to_string_pretty(&TransferResponse::from(&transfer)).into_diagnostic()?;
            println!("{output}");
            Ok(())
        }
        Command::RunScheduled { date } => {
            let store = open_store(&config).await?;
            let clock: Arc<dyn Clock> = match date {
                Some(date) => Arc::new(FixedClock::on(date)),
                None => Arc::new(SystemClock),
            };
            let today = clock.today();
            let orchestrator = TransferOrchestrator::new(store.clone(), clock.clone());
            let scheduler = ScheduledTransfers::new(store, orchestrator, clock);
            let summary = scheduler.run_due(today).await?;
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
            Ok(())
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<StoreHandle> {
    let store = select_store(config)?;
    if let Some(seed) = &config.seed {
        SeedData::load(seed)?.apply(&store).await?;
    }
    Ok(store)
}

#[cfg(feature = "storage-rocksdb")]
fn select_store(config: &AppConfig) -> Result<StoreHandle> {
    use pixflow::infrastructure::rocksdb::RocksDBStore;

    match &config.db_path {
        Some(db_path) => Ok(Arc::new(RocksDBStore::open(db_path)?)),
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn select_store(config: &AppConfig) -> Result<StoreHandle> {
    if config.db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryStore::new()))
}

fn build_assistant(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Assistant> {
    let client = build_client(config.http_timeout())?;
    let guard = |service: &'static str| {
        Resilience::new(
            service,
            config.breaker_settings(),
            config.retry_policy(),
            config.max_concurrency,
        )
    };

    let cache = TtlCache::new(config.cache_ttl_secs);
    let _sweeper = cache.spawn_sweeper(config.cache_sweep_interval());

    Ok(Assistant::new(
        Box::new(ProfileClient::new(
            client.clone(),
            config.profile_api_url.clone(),
            guard("profile"),
        )),
        Box::new(TransactionsClient::new(
            client.clone(),
            config.transactions_api_url.clone(),
            guard("transactions"),
        )),
        Box::new(AgentClient::new(
            client,
            config.agent_api_url.clone(),
            guard("agent"),
        )),
        cache,
        clock,
    ))
}
