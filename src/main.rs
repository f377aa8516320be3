use anyhow::Context;
use api_client::{
    DataCache, ExchangeClient, MarketDataClient, RateLimiter, RestDataClient, RestExchangeClient,
    RetryingClient,
};
use backtester::PortfolioSimulator;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use configuration::Config;
use engine::LiveEngine;
use executor::ExecutionContext;
use risk::ExposureGuard;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strategies::{deduplicate, group_by_symbol, TrailingReturn, UniverseFilter};
use tracing_subscriber::EnvFilter;

/// A cross-sectional rebalancing and execution engine.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate the configured strategies over a historical window.
    Backtest(BacktestArgs),
    /// Run one live rebalance cycle against the exchange.
    Live,
}

#[derive(Parser)]
struct BacktestArgs {
    /// Override the configured start date (format: YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Override the configured end date (format: YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

/// The main entry point for the Meridian trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = configuration::load_config().context("failed to load config.toml")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest(args) => run_backtest(config, args).await,
        Commands::Live => run_live(config).await,
    }
}

fn cache_path(config: &Config) -> PathBuf {
    Path::new(&config.data.cache_dir).join("history_cache.json")
}

/// Fetches the configured universe's history and runs every strategy
/// through the simulator, one after another.
async fn run_backtest(config: Config, args: BacktestArgs) -> anyhow::Result<()> {
    let start = args.from.unwrap_or(config.simulation.start_date);
    let end = args.to.unwrap_or(config.simulation.end_date);
    tracing::info!(%start, %end, symbols = config.data.symbols.len(), "starting backtest");

    let snapshot_path = cache_path(&config);
    let cache = DataCache::load(&snapshot_path)?;
    let limiter = RateLimiter::new(config.data.calls_per_minute);
    let data = RestDataClient::new(config.data.clone(), limiter, cache.clone())?;

    let bars = data
        .fetch_daily_bars(&config.data.symbols, start, end)
        .await
        .context("failed to fetch bar history")?;
    let panel = group_by_symbol(deduplicate(bars));
    cache.persist(&snapshot_path).await?;

    for cfg in &config.strategies {
        let guard = ExposureGuard::new(config.risk.clone())?;
        let filter = UniverseFilter {
            min_volume: config.data.min_volume,
            min_history: cfg.window,
            min_market_cap: config.data.min_market_cap,
            market_caps: config.data.market_caps.clone(),
        };
        let simulator = PortfolioSimulator::new(
            cfg.clone(),
            filter,
            Box::new(TrailingReturn),
            guard,
            config.simulation.initial_capital,
            config.simulation.cost_bps,
        );
        let history = simulator.run(&panel)?;
        if let Some(last) = history.last() {
            tracing::info!(
                strategy = %cfg.name,
                days = history.len(),
                final_value = %last.value,
                gross = %last.gross_exposure,
                "backtest complete"
            );
        }
    }
    Ok(())
}

/// Wires the live clients together and runs one rebalance cycle.
async fn run_live(config: Config) -> anyhow::Result<()> {
    let api_key = std::env::var("MERIDIAN_API_KEY").context("MERIDIAN_API_KEY is not set")?;

    let snapshot_path = cache_path(&config);
    let cache = DataCache::load(&snapshot_path)?;
    let data: Arc<dyn MarketDataClient> = Arc::new(RestDataClient::new(
        config.data.clone(),
        RateLimiter::new(config.data.calls_per_minute),
        cache.clone(),
    )?);
    let exchange: Arc<dyn ExchangeClient> = Arc::new(RestExchangeClient::new(
        config.execution.base_url.clone(),
        &api_key,
        Duration::from_secs(config.execution.api_timeout_secs),
        RateLimiter::new(config.data.calls_per_minute),
    )?);
    let ctx = Arc::new(ExecutionContext::new(
        exchange,
        RetryingClient::new(config.data.retry.clone()),
        config.execution.clone(),
    ));

    let engine = LiveEngine::new(config, data, ctx, Box::new(TrailingReturn))?;
    let reports = engine.run_cycle().await?;
    cache.persist(&snapshot_path).await?;

    for report in &reports {
        tracing::info!(
            symbol = %report.symbol,
            status = ?report.status,
            filled = %report.filled_qty,
            requested = %report.requested_qty,
            "fill report"
        );
    }
    tracing::info!(instructions = reports.len(), "live rebalance cycle complete");
    Ok(())
}
