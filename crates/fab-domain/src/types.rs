//! Shared domain types: the Trade/Order/Opportunity data model (spec §3).
//!
//! These types are intentionally dumb data holders — all state-transition
//! logic lives in `fab-execution` (open side) and `fab-position` (close
//! side). Keeping the struct definitions here lets every other crate depend
//! on a single, small, dependency-light vocabulary rather than on the
//! execution or position engines themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;

/// One of the two venues this core ever talks to. The teacher's equities
/// core parameterizes over an open-ended `BrokerId`; we close this down to
/// exactly two concrete venues because the whole execution algorithm
/// (maker-on-A / taker-on-B) is venue-asymmetric by construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    VenueA,
    VenueB,
}

impl Venue {
    pub fn other(self) -> Venue {
        match self {
            Venue::VenueA => Venue::VenueB,
            Venue::VenueB => Venue::VenueA,
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::VenueA => write!(f, "venue_a"),
            Venue::VenueB => write!(f, "venue_b"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    PostOnly,
}

/// Mirrors the teacher's `OrderState` (`mqk-execution::oms::state_machine`).
/// Transitions are monotonic toward a terminal state; no variant is ever
/// removed once added to a running system, so this enum is treated as
/// append-only.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// A single order placed on a single venue. `client_id` is the
/// idempotency key the venue adapter generates before submission so that a
/// retried submit after a network timeout never double-places.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_id: String,
    pub venue: Venue,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub qty: i64,
    pub price: Option<Micros>,
    pub status: OrderStatus,
    pub filled_qty: i64,
    pub avg_fill_price: Option<Micros>,
    pub fee: Micros,
    pub reduce_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn remaining_qty(&self) -> i64 {
        (self.qty - self.filled_qty).max(0)
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_qty >= self.qty
    }
}

/// One leg of a Trade, pinned to a single venue and side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeLeg {
    pub venue: Venue,
    pub side: Side,
    pub qty: i64,
    pub filled_qty: i64,
    pub entry_price: Option<Micros>,
    pub exit_price: Option<Micros>,
    pub fees: Micros,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
}

impl TradeLeg {
    pub fn new(venue: Venue, side: Side, qty: i64) -> Self {
        TradeLeg {
            venue,
            side,
            qty,
            filled_qty: 0,
            entry_price: None,
            exit_price: None,
            fees: Micros::ZERO,
            order_id: None,
            client_order_id: None,
        }
    }

    pub fn notional(&self, price: Micros) -> Option<Micros> {
        price.checked_mul_qty(self.filled_qty)
    }
}

/// Mirrors the teacher's split between data type (`Order`) and a parallel
/// `ExecutionState` transition-event enum (`OmsEvent` in
/// `mqk-execution::oms::state_machine`). `Trade.execution_state` tracks
/// progress through the open-pair algorithm in `fab-execution`; `Trade.status`
/// is the coarser externally-visible lifecycle stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Pending,
    Leg1Submitted,
    Leg1Filled,
    Leg2Submitted,
    Complete,
    RollbackNeeded,
    RollbackDone,
    Aborted,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Opening,
    Open,
    Closing,
    Closed,
    Failed,
    Rejected,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    DeltaBound,
    LiquidationDistance,
    EarlyTakeProfit,
    AtrTrailingStop,
    ProfitTarget,
    FundingVelocity,
    ZScoreExit,
    OpportunityDecayed,
    TimeStop,
    OperatorForced,
    BrokenHedge,
    /// Reconciler found the trade OPEN in the store with no corresponding
    /// live position on either venue.
    Zombie,
}

/// A delta-neutral paired position across the two venues.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub status: TradeStatus,
    pub execution_state: ExecutionState,
    pub leg1: TradeLeg,
    pub leg2: TradeLeg,
    pub target_qty: i64,
    pub target_notional: Micros,
    pub entry_apy: f64,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: Micros,
    pub funding_collected: Micros,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    /// Relative notional difference between the two legs' filled amounts at
    /// their respective entry prices — the delta-bound check's input. Returns
    /// `0.0` if either leg has no entry price yet (nothing to compare).
    pub fn leg_notional_drift(&self) -> f64 {
        let (Some(p1), Some(p2)) = (self.leg1.entry_price, self.leg2.entry_price) else {
            return 0.0;
        };
        let (Some(n1), Some(n2)) = (self.leg1.notional(p1), self.leg2.notional(p2)) else {
            return 0.0;
        };
        Micros::relative_diff(n1, n2)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, TradeStatus::Open)
    }

    pub fn net_pnl(&self) -> Micros {
        self.realized_pnl + self.funding_collected
    }
}

/// An evaluated funding-rate opportunity, produced by an out-of-scope
/// opportunity scanner (see [`crate::ports::OpportunitySource`]) and consumed
/// exactly once by `fab-execution::ExecutionEngine::execute`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub apy: f64,
    pub spread_pct: f64,
    pub suggested_qty: i64,
    pub suggested_notional: Micros,
    pub expected_value_usd: Micros,
    pub long_venue: Venue,
    pub short_venue: Venue,
    pub snapshot: OrderbookSnapshot,
}

impl Opportunity {
    pub fn is_valid(&self) -> bool {
        self.long_venue != self.short_venue && self.apy > 0.0 && self.suggested_qty > 0
    }
}

/// One side (bid or ask) of a venue's best-of-book level.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Micros,
    pub qty: i64,
}

/// Cross-venue top-of-book snapshot used for spread checks. Each venue's
/// side is `None` until at least one update has been observed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub symbol: String,
    pub venue_a_bid: Option<BookLevel>,
    pub venue_a_ask: Option<BookLevel>,
    pub venue_b_bid: Option<BookLevel>,
    pub venue_b_ask: Option<BookLevel>,
    pub venue_a_updated_at: Option<DateTime<Utc>>,
    pub venue_b_updated_at: Option<DateTime<Utc>>,
}

impl OrderbookSnapshot {
    pub fn empty(symbol: impl Into<String>) -> Self {
        OrderbookSnapshot {
            symbol: symbol.into(),
            venue_a_bid: None,
            venue_a_ask: None,
            venue_b_bid: None,
            venue_b_ask: None,
            venue_a_updated_at: None,
            venue_b_updated_at: None,
        }
    }

    /// `true` unless a side's bid/ask are present and inverted — an invariant
    /// violation that must invalidate the snapshot rather than propagate into
    /// a spread calculation.
    pub fn is_internally_consistent(&self) -> bool {
        let a_ok = match (self.venue_a_bid, self.venue_a_ask) {
            (Some(b), Some(a)) => b.price < a.price,
            _ => true,
        };
        let b_ok = match (self.venue_b_bid, self.venue_b_ask) {
            (Some(b), Some(a)) => b.price < a.price,
            _ => true,
        };
        a_ok && b_ok
    }
}

/// Stage boundary an `ExecutionAttempt` KPI record was written at. Append-only
/// log, never mutated after creation — mirrors the teacher's
/// `ExecutionAttempt` audit-trail convention in `mqk-execution::types`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStage {
    Preflight,
    SpreadCheck,
    LiquidityCheck,
    Leg1,
    HedgeDepthPreflight,
    Leg2,
    Finalize,
    Rollback,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Ok,
    Rejected,
    Aborted,
    Failed,
    Fatal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub attempt_id: String,
    pub trade_id: String,
    pub symbol: String,
    pub stage: AttemptStage,
    pub status: AttemptStatus,
    pub reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub spread_pct: Option<f64>,
}
