//! Wire-format mirror of the configuration surface the core recognizes.
//!
//! `BotConfig` is deserialized straight from the canonical JSON produced by
//! [`crate::load_layered_yaml`]/[`crate::load_layered_yaml_from_strings`].
//! It is deliberately flat primitives (`f64`/`u32`/`bool`/`String`), not the
//! richly-typed per-crate config structs (`fab_position::PositionConfig`,
//! `fab_execution::ExecutionConfig`, ...) — converting a raw percentage or
//! second count into a `Duration` or a `Micros` is the runtime's job once it
//! knows which crate is consuming which field. Keeping this crate free of a
//! `fab-domain` dependency keeps config loading usable from a tool that
//! never links the trading engine at all (e.g. a standalone config linter).

use crate::consumption::ConfigMode;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct BotConfig {
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub trading: TradingSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub websocket: WebSocketSection,
    #[serde(default)]
    pub shutdown: ShutdownSection,
    #[serde(default)]
    pub venues: VenuesSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeSection {
    pub mode: ConfigMode,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    pub desired_notional_usd: f64,
    pub max_open_trades: u32,
    pub cooldown_minutes: u32,
    pub min_apy_filter: f64,
    pub min_profit_exit_usd: f64,
    pub max_hold_hours: f64,
    pub min_hold_seconds: i64,
    pub funding_flip_hours_threshold: f64,
    pub max_spread_filter_percent: f64,
    pub early_take_profit_enabled: bool,
    pub early_take_profit_slippage_multiple: f64,
    pub atr_trailing_activation_usd: f64,
    pub atr_trailing_mult: f64,
    pub funding_velocity_exit_lookback_hours: u32,
    pub funding_velocity_exit_threshold_hourly_slope: f64,
    pub z_score_exit_threshold: f64,
    pub z_score_exit_lookback_hours: u32,
    pub delta_bound_min_delta_pct: f64,
    pub delta_bound_max_delta_pct: f64,
    pub rebalance_cooldown_seconds: u64,
    pub coordinated_close_timeout_seconds: u64,
    pub preflight_liquidity_depth_multiple: f64,
    pub maker_fill_probability: f64,
}

impl Default for TradingSection {
    fn default() -> Self {
        TradingSection {
            desired_notional_usd: 1_000.0,
            max_open_trades: 3,
            cooldown_minutes: 15,
            min_apy_filter: 0.05,
            min_profit_exit_usd: 10.0,
            max_hold_hours: 24.0 * 14.0,
            min_hold_seconds: 300,
            funding_flip_hours_threshold: 4.0,
            max_spread_filter_percent: 0.1,
            early_take_profit_enabled: true,
            early_take_profit_slippage_multiple: 2.0,
            atr_trailing_activation_usd: 20.0,
            atr_trailing_mult: 1.5,
            funding_velocity_exit_lookback_hours: 6,
            funding_velocity_exit_threshold_hourly_slope: -0.05,
            z_score_exit_threshold: 2.0,
            z_score_exit_lookback_hours: 168,
            delta_bound_min_delta_pct: 0.02,
            delta_bound_max_delta_pct: 0.08,
            rebalance_cooldown_seconds: 3600,
            coordinated_close_timeout_seconds: 30,
            preflight_liquidity_depth_multiple: 3.0,
            maker_fill_probability: 0.6,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub lead_exchange: String,
    pub maker_order_timeout_seconds: u64,
    pub maker_order_max_retries: u32,
    pub maker_max_aggressiveness: f64,
    pub taker_order_slippage: f64,
    pub leg1_escalate_to_taker_enabled: bool,
    pub hedge_ioc_max_attempts: u32,
    pub hedge_depth_preflight_enabled: bool,
    pub ws_fill_wait_enabled: bool,
    pub ws_ready_gate_timeout_seconds: u64,
    /// Open Question (a): Venue-A's maker/taker fee schedule is not
    /// documented precisely enough to hardcode; this constant isolates the
    /// assumption so it can be corrected without touching execution logic.
    pub venue_a_fee_scale: f64,
    /// A quantized size below the venues' shared minimum qty is bumped up
    /// to it rather than rejected, provided the bump stays within this
    /// multiple of the quantized size.
    pub max_min_qty_bump_multiple: f64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        ExecutionSection {
            lead_exchange: "venue_a".to_string(),
            maker_order_timeout_seconds: 8,
            maker_order_max_retries: 3,
            maker_max_aggressiveness: 1.0,
            taker_order_slippage: 0.0015,
            leg1_escalate_to_taker_enabled: true,
            hedge_ioc_max_attempts: 3,
            hedge_depth_preflight_enabled: true,
            ws_fill_wait_enabled: true,
            ws_ready_gate_timeout_seconds: 5,
            venue_a_fee_scale: 1.0,
            max_min_qty_bump_multiple: 1.2,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub max_drawdown_pct: f64,
    pub max_exposure_pct: f64,
    pub min_free_margin_pct: f64,
    pub broken_hedge_cooldown_seconds: u64,
}

impl Default for RiskSection {
    fn default() -> Self {
        RiskSection {
            max_drawdown_pct: 0.18,
            max_exposure_pct: 0.8,
            min_free_margin_pct: 0.1,
            broken_hedge_cooldown_seconds: 900,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebSocketSection {
    pub ping_interval_seconds: u64,
    pub reconnect_delay_initial_seconds: u64,
    pub reconnect_delay_max_seconds: u64,
    pub reconnect_jitter_factor: f64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown_seconds: u64,
    pub orderbook_l1_fallback_max_age_seconds: u64,
    pub lighter_orderbook_ws_max_connections: u32,
    pub lighter_orderbook_ws_ttl_seconds: u64,
    pub lighter_ws_order_submission_enabled: bool,
    /// Open Question (c): isolates the undocumented per-connection
    /// orderbook subscription ceiling behind a single override.
    pub orderbook_ws_max_subscriptions_per_connection: u32,
}

impl Default for WebSocketSection {
    fn default() -> Self {
        WebSocketSection {
            ping_interval_seconds: 15,
            reconnect_delay_initial_seconds: 1,
            reconnect_delay_max_seconds: 30,
            reconnect_jitter_factor: 0.2,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_seconds: 60,
            orderbook_l1_fallback_max_age_seconds: 10,
            lighter_orderbook_ws_max_connections: 4,
            lighter_orderbook_ws_ttl_seconds: 3600,
            lighter_ws_order_submission_enabled: false,
            orderbook_ws_max_subscriptions_per_connection: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownSection {
    pub close_positions_on_exit: bool,
    pub timeout_seconds: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        ShutdownSection { close_positions_on_exit: true, timeout_seconds: 30 }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VenueACredentialSection {
    pub signing_key_env: Option<String>,
    pub base_url: String,
}

impl Default for VenueACredentialSection {
    fn default() -> Self {
        VenueACredentialSection { signing_key_env: None, base_url: "https://venue-a.example".to_string() }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VenueBCredentialSection {
    pub api_key_env: Option<String>,
    pub api_secret_env: Option<String>,
    pub base_url: String,
}

impl Default for VenueBCredentialSection {
    fn default() -> Self {
        VenueBCredentialSection { api_key_env: None, api_secret_env: None, base_url: "https://venue-b.example".to_string() }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VenuesSection {
    pub venue_a: VenueACredentialSection,
    pub venue_b: VenueBCredentialSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    pub interval_seconds: u64,
    pub freshness_max_age_seconds: u64,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        ReconcileSection { interval_seconds: 60, freshness_max_age_seconds: 120 }
    }
}
