//! fab-runtime entry point.
//!
//! Intentionally thin, mirroring `mqk-daemon::main`: load configuration,
//! resolve secrets, wire the concrete adapters and subsystems, and hand off
//! to [`fab_runtime::supervisor::Supervisor`]. There is no interactive CLI
//! surface here beyond the `--config` layering flag — the product CLI is
//! out of scope per spec.md's Non-goals.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fab_config::bot_config::BotConfig;
use fab_config::{report_unused_keys, ConfigMode, UnusedKeyPolicy};
use fab_domain::ports::{EventBus, OpportunitySource, TradeStore};
use fab_execution::ExecutionEngine;
use fab_marketdata::MarketDataService;
use fab_position::{PositionCloser, PositionManager};
use fab_reconcile::{BrokenHedgeConfig, GhostPolicy, Reconciler};
use fab_runtime::gate::new_shared_gate;
use fab_runtime::metrics_source::PassthroughExitMetricsSource;
use fab_runtime::supervisor::{ShutdownConfig, Supervisor};
use fab_runtime::tracing_init::init_tracing;
use fab_runtime::wiring::{build_execution_config, build_position_config, build_staleness_config, build_venue_handles};
use fab_testkit::{BroadcastEventBus, InMemoryTradeStore, QueuedOpportunitySource};
use tokio::sync::Mutex;

/// Position-maintenance tick. Not part of the configuration surface —
/// tighter than the reconcile interval since exit rules must react quickly
/// to funding flips and delta drift.
const POSITION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "fab-runtime")]
#[command(about = "Delta-neutral funding-rate arbitrage core")]
struct Cli {
    /// Config layers in merge order (base -> env -> overrides).
    #[arg(long = "config", required = true)]
    config_paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = fab_config::load_layered_yaml(&path_refs).context("failed to load configuration")?;

    let config: BotConfig = serde_json::from_value(loaded.config_json.clone()).context("configuration did not match the expected shape")?;
    let mode = config.runtime.mode;

    let unused_policy = match mode {
        ConfigMode::Live => UnusedKeyPolicy::Fail,
        ConfigMode::Paper | ConfigMode::Backtest => UnusedKeyPolicy::Warn,
    };
    let unused = report_unused_keys(mode, &loaded.config_json, unused_policy)?;
    if !unused.is_clean() {
        tracing::warn!(count = unused.unused_leaf_pointers.len(), "configuration has unused keys");
    }

    tracing::info!(mode = ?mode, config_hash = %loaded.config_hash, "starting fab-runtime");

    let secrets = fab_config::secrets::resolve_secrets_for_mode(&loaded.config_json, mode)?;
    let venues = build_venue_handles(&config, &secrets)?;

    let market_data = Arc::new(MarketDataService::new(build_staleness_config(&config.websocket)));
    let trade_store: Arc<dyn TradeStore> = Arc::new(InMemoryTradeStore::new());
    let events: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new(1024));
    let opportunities: Arc<dyn OpportunitySource> = Arc::new(QueuedOpportunitySource::empty());

    let position_config = build_position_config(&config.trading, &config.risk);

    let engine = ExecutionEngine::new(
        Arc::clone(&venues.venue_a),
        Arc::clone(&venues.venue_b),
        Arc::clone(&venues.fill_cache_a),
        Arc::clone(&venues.fill_cache_b),
        Arc::clone(&market_data),
        Arc::clone(&trade_store),
        Arc::clone(&events),
        build_execution_config(&config.execution, &config.trading),
    );

    let closer = PositionCloser::new(
        Arc::clone(&venues.venue_a),
        Arc::clone(&venues.venue_b),
        Arc::clone(&venues.fill_cache_a),
        Arc::clone(&venues.fill_cache_b),
        Arc::clone(&market_data),
        Arc::clone(&trade_store),
        Arc::clone(&events),
        position_config.clone(),
    );

    let manager = PositionManager::new(
        Arc::clone(&venues.venue_a),
        Arc::clone(&venues.venue_b),
        Arc::clone(&trade_store),
        Arc::clone(&events),
        Arc::clone(&market_data),
        Arc::new(PassthroughExitMetricsSource),
        closer,
        position_config,
    );

    let reconciler = Reconciler::new(
        Arc::clone(&venues.venue_a),
        Arc::clone(&venues.venue_b),
        Arc::clone(&trade_store),
        Arc::clone(&events),
        GhostPolicy::AdoptIfPaired,
        BrokenHedgeConfig {
            cooldown: Duration::from_secs(config.risk.broken_hedge_cooldown_seconds),
            ..BrokenHedgeConfig::default()
        },
    );

    let supervisor = Supervisor {
        execution: Arc::new(engine),
        position: Arc::new(Mutex::new(manager)),
        reconciler,
        opportunities,
        gate: new_shared_gate(),
        reconcile_interval: Duration::from_secs(config.reconcile.interval_seconds),
        position_check_interval: POSITION_CHECK_INTERVAL,
        shutdown: ShutdownConfig {
            close_positions_on_exit: config.shutdown.close_positions_on_exit,
            timeout: Duration::from_secs(config.shutdown.timeout_seconds),
        },
    };

    supervisor.run().await
}
