//! Default [`ExitMetricsSource`] wired when no richer market-data-derived
//! source is configured. Computing ATR, funding-velocity slope, Z-score
//! statistics, and a scan of competing opportunities is explicitly out of
//! scope here — the same price-prediction/opportunity-discovery boundary
//! spec.md draws around `OpportunitySource` applies to exit metrics. This
//! source only reports what a `Trade` already carries, so statistical exit
//! layers quietly no-op (their inputs are `None`) until a real metrics feed
//! is wired behind the same trait.

use async_trait::async_trait;
use chrono::Utc;
use fab_domain::{Micros, Trade};
use fab_position::{ExitMetrics, ExitMetricsSource};

pub struct PassthroughExitMetricsSource;

#[async_trait]
impl ExitMetricsSource for PassthroughExitMetricsSource {
    async fn metrics_for(&self, trade: &Trade) -> anyhow::Result<ExitMetrics> {
        Ok(ExitMetrics {
            now: Utc::now(),
            unrealized_pnl: Micros::ZERO,
            liquidation_distance_pct: None,
            exit_cost_estimate: Micros::ZERO,
            atr_usd: None,
            trailing_peak_pnl: None,
            funding_velocity_hourly_slope: None,
            net_apy_mean: None,
            net_apy_stddev: None,
            current_net_apy: trade.entry_apy,
            hours_to_cover_exit_cost: None,
            entry_spread_pct: 0.0,
            current_spread_pct: 0.0,
            best_external_apy: None,
            funding_flip_hours: None,
        })
    }
}
