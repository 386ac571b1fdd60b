//! Inputs the exit-rule layers evaluate against. Computing these (ATR,
//! funding-rate history slope, Z-score mean/stddev, a scan of external
//! opportunities) is out of scope for this crate — the same boundary the
//! teacher draws around `fab_domain::ports::OpportunitySource` for opening.
//! `fab-runtime` wires a concrete [`ExitMetricsSource`] at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fab_domain::{Micros, Trade};

#[derive(Clone, Debug)]
pub struct ExitMetrics {
    pub now: DateTime<Utc>,
    /// Mark-to-market PnL not yet realized by a close, in addition to
    /// `trade.net_pnl()`.
    pub unrealized_pnl: Micros,
    pub liquidation_distance_pct: Option<f64>,
    /// Estimated round-trip cost (fees + expected slippage) of closing now.
    pub exit_cost_estimate: Micros,
    pub atr_usd: Option<Micros>,
    /// Caller-maintained trailing-stop high-water mark; `None` until the
    /// ATR trailing stop has activated for this trade.
    pub trailing_peak_pnl: Option<Micros>,
    pub funding_velocity_hourly_slope: Option<f64>,
    pub net_apy_mean: Option<f64>,
    pub net_apy_stddev: Option<f64>,
    pub current_net_apy: f64,
    pub hours_to_cover_exit_cost: Option<f64>,
    pub entry_spread_pct: f64,
    pub current_spread_pct: f64,
    pub best_external_apy: Option<f64>,
    pub funding_flip_hours: Option<f64>,
}

#[async_trait]
pub trait ExitMetricsSource: Send + Sync {
    async fn metrics_for(&self, trade: &Trade) -> anyhow::Result<ExitMetrics>;
}
