//! Exit-rule layers — pure, deterministic, no I/O. Mirrors the shape of
//! `mqk-risk::engine::evaluate`: a fixed sequence of checks, first hit wins,
//! with one override (Emergency bypasses min-hold; nothing else does).
//!
//! `trailing_peak_pnl` and any other carried-forward state lives in the
//! caller (`PositionManager`), not here — this function is a pure
//! `(config, trade, metrics) -> decision` mapping, exactly like the risk
//! engine's `evaluate(cfg, state, input)` except the sticky state is read,
//! never mutated, by this layer.

use fab_domain::{CloseReason, Micros, Side, Trade};

use crate::config::PositionConfig;
use crate::metrics::ExitMetrics;

#[derive(Clone, Debug, PartialEq)]
pub enum ExitDecision {
    Close { reason: CloseReason },
    Rebalance { reduce_leg: Side, reduce_qty: i64 },
}

fn held_seconds(trade: &Trade, now: chrono::DateTime<chrono::Utc>) -> i64 {
    let since = trade.opened_at.unwrap_or(trade.created_at);
    (now - since).num_seconds().max(0)
}

/// Which leg carries more notional right now — the one rebalance reduces.
fn larger_leg(trade: &Trade) -> Option<(Side, i64)> {
    let (Some(p1), Some(p2)) = (trade.leg1.entry_price, trade.leg2.entry_price) else {
        return None;
    };
    let (Some(n1), Some(n2)) = (trade.leg1.notional(p1), trade.leg2.notional(p2)) else {
        return None;
    };
    if n1 == n2 {
        return None;
    }
    let (bigger_side, bigger_qty, smaller_qty) = if n1 > n2 {
        (trade.leg1.side, trade.leg1.filled_qty, trade.leg2.filled_qty)
    } else {
        (trade.leg2.side, trade.leg2.filled_qty, trade.leg1.filled_qty)
    };
    Some((bigger_side, (bigger_qty - smaller_qty).max(0)))
}

pub fn evaluate_exit(cfg: &PositionConfig, trade: &Trade, metrics: &ExitMetrics) -> Option<ExitDecision> {
    // --- Emergency (overrides min-hold) ---
    let drift = trade.leg_notional_drift();
    if drift >= cfg.delta_bound_max_delta_pct {
        return Some(ExitDecision::Close { reason: CloseReason::DeltaBound });
    }
    if drift >= cfg.delta_bound_min_delta_pct {
        if let Some((side, qty)) = larger_leg(trade) {
            if qty > 0 {
                return Some(ExitDecision::Rebalance { reduce_leg: side, reduce_qty: qty });
            }
        }
    }
    if let Some(dist) = metrics.liquidation_distance_pct {
        if dist < cfg.liquidation_distance_min_pct {
            return Some(ExitDecision::Close { reason: CloseReason::LiquidationDistance });
        }
    }

    let net_pnl = trade.net_pnl() + metrics.unrealized_pnl;
    let early_tp_threshold = cfg.min_profit_exit_usd
        + Micros::new((metrics.exit_cost_estimate.raw() as f64 * cfg.early_tp_slippage_multiple) as i64);

    // --- Profit (Early-TP bypasses min-hold) ---
    if net_pnl >= early_tp_threshold {
        return Some(ExitDecision::Close { reason: CloseReason::EarlyTakeProfit });
    }

    let past_min_hold = held_seconds(trade, metrics.now) >= cfg.min_hold_seconds;
    if past_min_hold {
        if net_pnl >= cfg.atr_trailing_activation_usd {
            if let Some(atr) = metrics.atr_usd {
                let peak = metrics.trailing_peak_pnl.unwrap_or(net_pnl).max(net_pnl);
                let trail_floor = peak - Micros::new((atr.raw() as f64 * cfg.atr_trailing_mult) as i64);
                if net_pnl <= trail_floor {
                    return Some(ExitDecision::Close { reason: CloseReason::AtrTrailingStop });
                }
            }
        }
        if net_pnl >= cfg.min_profit_exit_usd {
            return Some(ExitDecision::Close { reason: CloseReason::ProfitTarget });
        }
    }

    // --- Statistical ---
    if let Some(slope) = metrics.funding_velocity_hourly_slope {
        if slope < cfg.velocity_threshold_hourly_slope {
            return Some(ExitDecision::Close { reason: CloseReason::FundingVelocity });
        }
    }
    if let (Some(mean), Some(stddev)) = (metrics.net_apy_mean, metrics.net_apy_stddev) {
        if stddev > 0.0 && metrics.current_net_apy < mean - cfg.z_score_exit_threshold * stddev {
            return Some(ExitDecision::Close { reason: CloseReason::ZScoreExit });
        }
    }
    if let Some(hours) = metrics.hours_to_cover_exit_cost {
        if hours > cfg.yield_vs_cost_max_hours {
            return Some(ExitDecision::Close { reason: CloseReason::OpportunityDecayed });
        }
    }
    if metrics.entry_spread_pct > 0.0
        && metrics.current_spread_pct <= metrics.entry_spread_pct * (1.0 - cfg.basis_convergence_ratio)
        && net_pnl >= cfg.min_profit_exit_usd
    {
        return Some(ExitDecision::Close { reason: CloseReason::OpportunityDecayed });
    }

    // --- Opportunity ---
    if let Some(best_apy) = metrics.best_external_apy {
        if best_apy >= trade.entry_apy + cfg.opportunity_cost_apy_diff {
            return Some(ExitDecision::Close { reason: CloseReason::OpportunityDecayed });
        }
    }

    // --- Time ---
    if let Some(flip_hours) = metrics.funding_flip_hours {
        if flip_hours > cfg.funding_flip_hours_threshold {
            return Some(ExitDecision::Close { reason: CloseReason::TimeStop });
        }
    }
    if held_seconds(trade, metrics.now) as f64 / 3600.0 > cfg.max_hold_hours {
        return Some(ExitDecision::Close { reason: CloseReason::TimeStop });
    }

    None
}
