//! Position Manager configuration: every threshold the exit-rule layers and
//! close strategies read. Grouped the way the teacher's `RiskConfig` groups
//! its thresholds — one flat struct with `sane_defaults()`, no nested
//! builder ceremony.

use std::time::Duration;

use fab_domain::Micros;

/// Z-score exit lookback default, carried over from the Python constant
/// `_Z_SCORE_EXIT_LOOKBACK_HOURS` (7 days).
pub const DEFAULT_Z_SCORE_EXIT_LOOKBACK_HOURS: u32 = 168;

#[derive(Clone, Debug)]
pub struct PositionConfig {
    // --- emergency: delta bound / liquidation ---
    pub delta_bound_min_delta_pct: f64,
    pub delta_bound_max_delta_pct: f64,
    pub liquidation_distance_min_pct: f64,

    // --- profit layer ---
    pub min_hold_seconds: i64,
    pub early_tp_slippage_multiple: f64,
    pub atr_trailing_activation_usd: Micros,
    pub atr_trailing_mult: f64,
    pub min_profit_exit_usd: Micros,

    // --- statistical layer ---
    pub velocity_lookback_hours: u32,
    pub velocity_threshold_hourly_slope: f64,
    pub z_score_exit_threshold: f64,
    pub z_score_exit_lookback_hours: u32,
    pub yield_vs_cost_max_hours: f64,
    pub basis_convergence_ratio: f64,

    // --- opportunity layer ---
    pub opportunity_cost_apy_diff: f64,
    pub opportunity_rotate_cooldown: Duration,

    /// Minimum gap between rebalances on the same symbol, so a jittery book
    /// doesn't trigger a rebalance order every tick.
    pub rebalance_cooldown: Duration,

    /// Bounded concurrency cap for `PositionManager::check_trades`'s
    /// per-trade exit evaluation fan-out.
    pub max_concurrent_exit_checks: usize,

    // --- time layer ---
    pub funding_flip_hours_threshold: f64,
    pub max_hold_hours: f64,

    // --- close strategies ---
    pub maker_order_timeout: Duration,
    pub maker_order_max_retries: u32,
    pub hedge_ioc_max_attempts: u32,
    pub soft_close_attempts: u32,
    pub dust_qty: i64,

    // --- broken hedge ---
    pub broken_hedge_consecutive_hits: u32,
    pub broken_hedge_min_observation: Duration,
    pub broken_hedge_cooldown: Duration,
}

impl Default for PositionConfig {
    fn default() -> Self {
        PositionConfig {
            delta_bound_min_delta_pct: 0.02,
            delta_bound_max_delta_pct: 0.08,
            liquidation_distance_min_pct: 0.05,

            min_hold_seconds: 300,
            early_tp_slippage_multiple: 2.0,
            atr_trailing_activation_usd: Micros::new(20 * fab_domain::fixedpoint::MICROS_PER_UNIT),
            atr_trailing_mult: 1.5,
            min_profit_exit_usd: Micros::new(10 * fab_domain::fixedpoint::MICROS_PER_UNIT),

            velocity_lookback_hours: 6,
            velocity_threshold_hourly_slope: -0.05,
            z_score_exit_threshold: 2.0,
            z_score_exit_lookback_hours: DEFAULT_Z_SCORE_EXIT_LOOKBACK_HOURS,
            yield_vs_cost_max_hours: 72.0,
            basis_convergence_ratio: 0.7,

            opportunity_cost_apy_diff: 0.15,
            opportunity_rotate_cooldown: Duration::from_secs(3600),
            rebalance_cooldown: Duration::from_secs(3600),
            max_concurrent_exit_checks: 8,

            funding_flip_hours_threshold: 4.0,
            max_hold_hours: 24.0 * 14.0,

            maker_order_timeout: Duration::from_secs(6),
            maker_order_max_retries: 3,
            hedge_ioc_max_attempts: 3,
            soft_close_attempts: 2,
            dust_qty: 1,

            broken_hedge_consecutive_hits: 3,
            broken_hedge_min_observation: Duration::from_secs(45),
            broken_hedge_cooldown: Duration::from_secs(900),
        }
    }
}
