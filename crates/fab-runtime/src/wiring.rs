//! Converts the flat-primitive [`fab_config::BotConfig`] into the richly
//! typed config structs each crate consumes, and constructs the concrete
//! venue adapters from resolved secrets. This is the runtime's job per
//! `fab-config::bot_config`'s own module doc: `fab-config` stays free of a
//! `fab_domain` dependency, so the `Duration`/`Micros` conversion happens
//! here instead.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fab_config::bot_config::{BotConfig, ExecutionSection, RiskSection, TradingSection, WebSocketSection};
use fab_config::secrets::ResolvedSecrets;
use fab_domain::fixedpoint::MICROS_PER_UNIT;
use fab_domain::Micros;
use fab_execution::ExecutionConfig;
use fab_marketdata::{FillCache, StalenessConfig};
use fab_position::PositionConfig;
use fab_venue::{VenueAAdapter, VenueASigner, VenueAdapter, VenueBAdapter, VenueBSigner};

fn usd_to_micros(usd: f64) -> Micros {
    Micros::new((usd * MICROS_PER_UNIT as f64).round() as i64)
}

pub fn build_execution_config(exec: &ExecutionSection, trading: &TradingSection) -> ExecutionConfig {
    let mut cfg = ExecutionConfig::default();
    cfg.leg1_fill_wait = Duration::from_secs(exec.maker_order_timeout_seconds);
    cfg.leg1_max_reprices = exec.maker_order_max_retries;
    cfg.leg1_taker_escalation = exec.leg1_escalate_to_taker_enabled;
    cfg.liquidity_safety_factor = trading.preflight_liquidity_depth_multiple;
    cfg.max_min_qty_bump_multiple = exec.max_min_qty_bump_multiple;
    cfg
}

pub fn build_position_config(trading: &TradingSection, risk: &RiskSection) -> PositionConfig {
    let mut cfg = PositionConfig::default();
    cfg.delta_bound_min_delta_pct = trading.delta_bound_min_delta_pct;
    cfg.delta_bound_max_delta_pct = trading.delta_bound_max_delta_pct;
    cfg.min_hold_seconds = trading.min_hold_seconds;
    cfg.early_tp_slippage_multiple = trading.early_take_profit_slippage_multiple;
    cfg.atr_trailing_activation_usd = usd_to_micros(trading.atr_trailing_activation_usd);
    cfg.atr_trailing_mult = trading.atr_trailing_mult;
    cfg.min_profit_exit_usd = usd_to_micros(trading.min_profit_exit_usd);
    cfg.velocity_lookback_hours = trading.funding_velocity_exit_lookback_hours;
    cfg.velocity_threshold_hourly_slope = trading.funding_velocity_exit_threshold_hourly_slope;
    cfg.z_score_exit_threshold = trading.z_score_exit_threshold;
    cfg.z_score_exit_lookback_hours = trading.z_score_exit_lookback_hours;
    cfg.rebalance_cooldown = Duration::from_secs(trading.rebalance_cooldown_seconds);
    cfg.funding_flip_hours_threshold = trading.funding_flip_hours_threshold;
    cfg.max_hold_hours = trading.max_hold_hours;
    cfg.broken_hedge_cooldown = Duration::from_secs(risk.broken_hedge_cooldown_seconds);
    cfg
}

pub fn build_staleness_config(ws: &WebSocketSection) -> StalenessConfig {
    StalenessConfig { max_age: Duration::from_secs(ws.orderbook_l1_fallback_max_age_seconds) }
}

/// The two venue adapters plus the fill caches their orders are recorded
/// into, wired once at startup and shared (via `Arc`) across every task that
/// touches a venue.
pub struct VenueHandles {
    pub venue_a: Arc<dyn VenueAdapter>,
    pub venue_b: Arc<dyn VenueAdapter>,
    pub fill_cache_a: Arc<FillCache>,
    pub fill_cache_b: Arc<FillCache>,
}

pub fn build_venue_handles(config: &BotConfig, secrets: &ResolvedSecrets) -> Result<VenueHandles> {
    let fill_cache_a = Arc::new(FillCache::new());
    let fill_cache_b = Arc::new(FillCache::new());

    let venue_a: Arc<dyn VenueAdapter> = match &secrets.venue_a_signing_key {
        Some(key_hex) => {
            let seed = decode_signing_key(key_hex)?;
            let signer = VenueASigner::from_bytes(&seed);
            Arc::new(VenueAAdapter::new(config.venues.venue_a.base_url.clone(), signer, Arc::clone(&fill_cache_a)))
        }
        None => {
            // BACKTEST mode: no credentials required, wire an unsigned
            // placeholder key so the adapter can still be constructed.
            let signer = VenueASigner::from_bytes(&[0u8; 32]);
            Arc::new(VenueAAdapter::new(config.venues.venue_a.base_url.clone(), signer, Arc::clone(&fill_cache_a)))
        }
    };

    let venue_b: Arc<dyn VenueAdapter> = {
        let api_key = secrets.venue_b_api_key.clone().unwrap_or_default();
        let api_secret = secrets.venue_b_api_secret.clone().unwrap_or_default();
        let signer = VenueBSigner::new(api_key, api_secret.into_bytes());
        Arc::new(VenueBAdapter::new(config.venues.venue_b.base_url.clone(), signer, Arc::clone(&fill_cache_b)))
    };

    Ok(VenueHandles { venue_a, venue_b, fill_cache_a, fill_cache_b })
}

fn decode_signing_key(key_hex: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(key_hex.trim()).context("VENUE_A signing key is not valid hex")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("VENUE_A signing key must decode to exactly 32 bytes"))
}
