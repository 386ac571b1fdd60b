//! Invariant: `wiring` converts a `BotConfig` section into the richly-typed
//! per-crate config without silently dropping the values an operator set,
//! and leaves whatever the section doesn't know about at the crate's own
//! sane default.

use fab_config::bot_config::BotConfig;
use fab_runtime::wiring::{build_execution_config, build_position_config, build_staleness_config};
use std::time::Duration;

fn load(yaml: &str) -> BotConfig {
    let loaded = fab_config::load_layered_yaml_from_strings(&[yaml]).unwrap();
    serde_json::from_value(loaded.config_json).unwrap()
}

#[test]
fn execution_config_carries_maker_timeout_and_retries_through() {
    let cfg = load(
        "runtime:\n  mode: paper\nexecution:\n  maker_order_timeout_seconds: 12\n  maker_order_max_retries: 5\n",
    );
    let exec_cfg = build_execution_config(&cfg.execution, &cfg.trading);
    assert_eq!(exec_cfg.leg1_fill_wait, Duration::from_secs(12));
    assert_eq!(exec_cfg.leg1_max_reprices, 5);
}

#[test]
fn position_config_converts_usd_thresholds_to_micros() {
    let cfg = load("runtime:\n  mode: paper\ntrading:\n  min_profit_exit_usd: 25\n");
    let pos_cfg = build_position_config(&cfg.trading, &cfg.risk);
    assert_eq!(pos_cfg.min_profit_exit_usd.raw(), 25_000_000);
}

#[test]
fn staleness_config_reads_orderbook_fallback_age() {
    let cfg = load("runtime:\n  mode: paper\nwebsocket:\n  orderbook_l1_fallback_max_age_seconds: 30\n");
    let staleness = build_staleness_config(&cfg.websocket);
    assert_eq!(staleness.max_age, Duration::from_secs(30));
}
