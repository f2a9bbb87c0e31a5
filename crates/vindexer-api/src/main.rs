use {
    anyhow::{Context, Result},
    clap::Parser,
    std::sync::Arc,
    tracing::{error, info, warn},
    tracing_subscriber::EnvFilter,
    vindexer_api::{
        cli::{validate_ledger_access, Cli, Command},
        ApiConfig, ApiServer, HealthService,
    },
    vindexer_common::{
        utils::{wait_for, RetryPolicy, WaitOutcome},
        IndexerConfig, StackEntry,
    },
    vindexer_indexer::VoteIndexer,
    vindexer_ledger::{LedgerClient, TonCenterClient},
    vindexer_store::StoreFactory,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Warning: Failed to set global tracing subscriber: {}", e);
    }

    match cli.command() {
        Command::Serve => serve(config).await,
        Command::State => print_state(&config).await,
        Command::Call { method, ints } => call_getter(&config, &method, ints).await,
        Command::WaitLt {
            lt,
            interval_ms,
            attempts,
        } => wait_lt(&config, lt, interval_ms, attempts).await,
        Command::Reindex { from_lt } => reindex(config, from_lt).await,
    }
}

fn ledger_client(config: &IndexerConfig) -> Result<Arc<dyn LedgerClient>> {
    validate_ledger_access(config)?;
    let client = TonCenterClient::new(&config.ledger);
    info!("Using ledger endpoint {}", client.endpoint());
    Ok(Arc::new(client))
}

async fn serve(config: IndexerConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let store = StoreFactory::new(config.store.clone())
        .create_store()
        .await
        .context("failed to open the vote store")?;
    let ledger = ledger_client(&config)?;

    let indexer = Arc::new(VoteIndexer::new(
        config.contract_address.clone(),
        config.indexer.clone(),
        config.schema.clone(),
        ledger.clone(),
        store.clone(),
    ));

    let health = Arc::new(HealthService::new());
    health
        .register_defaults(store.clone(), ledger, config.contract_address.clone())
        .await;

    let api_config = ApiConfig::from_settings(&config.api, config.metrics_enabled)?;
    let server = ApiServer::new(api_config, store.clone(), indexer.clone(), health);

    info!(
        "Indexing {} with wire schema v{}",
        config.contract_address, config.schema.version
    );
    indexer.start();

    let result = server.start(shutdown_signal()).await;
    if let Err(e) = &result {
        error!("API server stopped with error: {}", e);
    }

    indexer.stop();
    indexer.join().await;
    if let Err(e) = store.close().await {
        warn!("Failed to close the vote store: {}", e);
    }
    info!("Shutdown complete");
    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for the shutdown signal: {}", e),
    }
}

async fn print_state(config: &IndexerConfig) -> Result<()> {
    let ledger = ledger_client(config)?;
    let state = ledger.get_contract_state(&config.contract_address).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

async fn call_getter(config: &IndexerConfig, method: &str, ints: Vec<i128>) -> Result<()> {
    let ledger = ledger_client(config)?;
    let args = ints.into_iter().map(StackEntry::Int).collect();
    let result = ledger
        .call_readonly_method(&config.contract_address, method, args)
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn wait_lt(config: &IndexerConfig, lt: u64, interval_ms: u64, attempts: u32) -> Result<()> {
    let ledger = ledger_client(config)?;
    let interval = std::time::Duration::from_millis(interval_ms);
    let policy = RetryPolicy::new(interval, attempts, interval * attempts.max(1));

    let outcome = wait_for(&policy, |attempt| {
        let ledger = ledger.clone();
        let address = config.contract_address.clone();
        async move {
            let state = ledger.get_contract_state(&address).await?;
            let current = state.last_transaction_lt.unwrap_or(0);
            info!("Attempt {}: contract lt {}", attempt, current);
            Ok((current > lt).then_some(current))
        }
    })
    .await;

    match outcome {
        WaitOutcome::Confirmed { value, attempts } => {
            println!("Contract reached lt {} after {} attempt(s)", value, attempts);
            Ok(())
        }
        WaitOutcome::TimedOut { attempts } => {
            anyhow::bail!("contract lt did not pass {} after {} attempt(s)", lt, attempts)
        }
    }
}

async fn reindex(config: IndexerConfig, from_lt: u64) -> Result<()> {
    config.store.validate()?;
    let store = StoreFactory::new(config.store.clone()).create_store().await?;
    let previous = store.last_processed_lt().await?;
    store.reset_watermark(from_lt).await?;
    store.close().await?;
    println!("Watermark moved from {:?} to {}", previous, from_lt);
    Ok(())
}
