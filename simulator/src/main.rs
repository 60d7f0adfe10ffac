//! FxWallet Simulator
//!
//! Load generator for the wallet services: seeds users, runs concurrent
//! deposits, withdrawals and exchanges, then checks the ledger invariants.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;

use fxwallet::telemetry::init_tracing;
use fxwallet::{Services, WalletConfig};
use fxwallet_fx::{GrpcRateProvider, RateCache, RateProvider};

mod controller;
mod metrics;
mod rates;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// FxWallet Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "FxWallet load simulator")]
struct Args {
    /// Number of users to register
    #[arg(short, long, default_value = "10")]
    users: usize,

    /// Total operations to run
    #[arg(short, long, default_value = "10000")]
    operations: usize,

    /// Concurrent tasks issuing operations
    #[arg(short, long, default_value = "16")]
    concurrency: usize,

    /// Scenario to run (random, contention)
    #[arg(short, long, default_value = "random")]
    scenario: String,

    /// Starting balance of every currency in every wallet
    #[arg(long, default_value = "1000")]
    initial_balance: Decimal,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Postgres URL; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Rate service address; fixed local rates are used when absent
    #[arg(long, env = "RATES_PROVIDER_ADDR")]
    rates_addr: Option<String>,
}

async fn build_services(args: &Args, config: &WalletConfig) -> anyhow::Result<Services> {
    let mut config = config.clone();
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(addr) = &args.rates_addr {
        config.rates.provider_addr = addr.clone();
    }

    let services = match (&args.database_url, &args.rates_addr) {
        (Some(_), Some(_)) => Services::connect(&config).await?,
        (Some(_), None) => Services::connect_with(&config, rates::mock_provider()).await?,
        (None, rates_addr) => {
            let provider: Arc<dyn RateProvider> = match rates_addr {
                Some(addr) => Arc::new(GrpcRateProvider::connect_lazy(
                    addr,
                    config.rates.request_timeout,
                )?),
                None => rates::mock_provider(),
            };
            let cache = Arc::new(RateCache::with_config(config.rates.cache_config()));
            Services::in_memory(provider, cache).0
        }
    };
    Ok(services)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WalletConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    init_tracing(&config);

    let args = Args::parse();
    let scenario = Scenario::load(&args.scenario)?;

    info!(
        users = args.users,
        store = if args.database_url.is_some() { "postgres" } else { "memory" },
        "Starting FxWallet Simulator"
    );

    let services = Arc::new(build_services(&args, &config).await?);
    let mut controller = SimulationController::new(services, scenario, args.seed);
    controller
        .initialize(args.users, args.initial_balance)
        .await?;

    let started = Instant::now();
    controller.run(args.operations, args.concurrency).await?;
    let elapsed: Duration = started.elapsed();

    controller.verify().await?;

    let metrics = controller.get_metrics();
    info!(
        total = metrics.total_operations,
        successful = metrics.successful_operations,
        rejected = metrics.rejected_operations,
        failed = metrics.failed_operations,
        avg_latency_us = metrics.average_latency_us(),
        p50_latency_us = metrics.p50_latency_us(),
        p99_latency_us = metrics.p99_latency_us(),
        throughput = metrics.throughput(elapsed),
        "Simulation complete"
    );

    Ok(())
}
