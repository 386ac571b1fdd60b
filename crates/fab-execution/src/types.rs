//! Execution-local types: the leg-submission request the engine builds from
//! an `Opportunity`, and the engine's typed error taxonomy. The Trade/Order
//! data model itself lives in `fab_domain` — this module holds only what is
//! private to the open-pair algorithm.

use fab_domain::{Micros, Opportunity, Side, Venue};

/// One leg of an open attempt, derived from an `Opportunity` plus the
/// quantized size the Position Manager's sizing rules settled on.
#[derive(Clone, Debug)]
pub struct LegPlan {
    pub venue: Venue,
    pub side: Side,
    pub qty: i64,
    pub symbol: String,
}

impl LegPlan {
    pub fn long_leg(opp: &Opportunity, qty: i64) -> Self {
        LegPlan {
            venue: opp.long_venue,
            side: Side::Long,
            qty,
            symbol: opp.symbol.clone(),
        }
    }

    pub fn short_leg(opp: &Opportunity, qty: i64) -> Self {
        LegPlan {
            venue: opp.short_venue,
            side: Side::Short,
            qty,
            symbol: opp.symbol.clone(),
        }
    }
}

/// Reasons `ExecutionEngine::execute` can fail to open a Trade, mirroring the
/// `AttemptStage`/`AttemptStatus` pair recorded on every attempt.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("gate refused: {0}")]
    GateRefused(#[from] crate::gateway::GateRefusal),
    #[error(transparent)]
    Gateway(#[from] crate::gateway::GatewayError),
    #[error("opportunity is no longer valid")]
    InvalidOpportunity,
    #[error("spread moved past tolerance before leg1 could be placed")]
    SpreadMoved,
    #[error("insufficient book depth for the hedge leg")]
    InsufficientHedgeDepth,
    #[error("available balance on one or both venues is below the required margin")]
    InsufficientBalance,
    #[error("quantized size is below the venues' minimum and exceeds the allowed bump")]
    QtyBelowMinimum,
    #[error("leg1 did not fill within the attempt window")]
    Leg1Timeout,
    #[error("venue adapter error: {0}")]
    Venue(#[from] fab_venue::VenueError),
    #[error("leg2 could not be hedged; rollback executed")]
    RolledBack,
    #[error("leg2 could not be hedged and rollback itself failed — broken hedge")]
    BrokenHedge,
}

/// Minimum relative notional drift below which the two legs are considered
/// balanced; used by the liquidity/spread preflight, not by the ongoing
/// delta-bound monitor (that lives in `fab-position`).
pub const PREFLIGHT_NOTIONAL_TOLERANCE: f64 = 0.02;

pub fn notional_ok(target: Micros, filled: Micros) -> bool {
    Micros::relative_diff(target, filled) <= PREFLIGHT_NOTIONAL_TOLERANCE
}
