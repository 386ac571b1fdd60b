//! Dual-venue snapshot and report types consumed by [`crate::engine`].
//!
//! Generalizes the teacher's single-broker `LocalSnapshot`/`BrokerSnapshot`
//! pair (keyed by `order_id`) to a per-venue live-position snapshot keyed by
//! symbol, compared against the store's view of OPEN trades rather than
//! against a locally-tracked order book.

use std::collections::BTreeMap;

use fab_domain::{Side, Venue};

/// A single venue's live position for one symbol, as read from
/// `VenueAdapter::list_positions`.
#[derive(Clone, Debug, PartialEq)]
pub struct LivePosition {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
}

/// One venue's full position snapshot, timestamped so [`crate::watermark`]
/// can reject stale reads.
#[derive(Clone, Debug, PartialEq)]
pub struct VenueSnapshot {
    pub venue: Venue,
    pub fetched_at_ms: i64,
    pub positions: BTreeMap<String, LivePosition>,
}

impl VenueSnapshot {
    pub fn empty(venue: Venue, fetched_at_ms: i64) -> Self {
        VenueSnapshot { venue, fetched_at_ms, positions: BTreeMap::new() }
    }
}

/// A Trade marked OPEN in the store with no corresponding live position on
/// either venue — spec.md §4.5's "zombie".
#[derive(Clone, Debug, PartialEq)]
pub struct ZombieTrade {
    pub trade_id: String,
    pub symbol: String,
}

/// A live venue position with no OPEN Trade referencing that venue+symbol —
/// spec.md §4.5's "ghost".
#[derive(Clone, Debug, PartialEq)]
pub struct GhostPosition {
    pub venue: Venue,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
}

/// A Trade whose recorded leg side contradicts the live position's side on
/// that venue. Per spec.md §4.5, this is logged and surfaced, never
/// auto-corrected.
#[derive(Clone, Debug, PartialEq)]
pub struct SideMismatch {
    pub trade_id: String,
    pub venue: Venue,
    pub symbol: String,
    pub trade_side: Side,
    pub live_side: Side,
}

/// A Trade with a live position on exactly one of its two venues — the
/// other leg is entirely absent rather than merely side-mismatched. Per
/// spec.md §4.2/§4.5 this is a **broken hedge**: a single reading is raised
/// every sweep it persists, but [`crate::broken_hedge::BrokenHedgeDetector`]
/// only treats it as actionable once it survives several consecutive sweeps.
#[derive(Clone, Debug, PartialEq)]
pub struct BrokenHedgeTrade {
    pub trade_id: String,
    pub symbol: String,
    pub live_venue: Venue,
    pub live_side: Side,
    pub live_qty: i64,
    pub missing_venue: Venue,
}

/// What a reconcile pass found, before any remediation is taken.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ReconcileReport {
    pub zombies: Vec<ZombieTrade>,
    pub ghosts: Vec<GhostPosition>,
    pub side_mismatches: Vec<SideMismatch>,
    pub broken_hedges: Vec<BrokenHedgeTrade>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.zombies.is_empty()
            && self.ghosts.is_empty()
            && self.side_mismatches.is_empty()
            && self.broken_hedges.is_empty()
    }
}

/// Result of a full reconcile pass including remediation, matching
/// spec.md §4.5's `reconcile(startup) →
/// {zombies_closed, ghosts_closed, ghosts_adopted, errors}` contract.
#[derive(Clone, Debug, Default)]
pub struct ReconcileOutcome {
    pub zombies_closed: Vec<String>,
    pub ghosts_closed: Vec<GhostPosition>,
    pub ghosts_adopted: Vec<String>,
    pub side_mismatches: Vec<SideMismatch>,
    pub broken_hedges_flattened: Vec<String>,
    pub errors: Vec<String>,
}

impl ReconcileOutcome {
    /// A reconcile is clean only if nothing needed remediation and nothing
    /// errored — side mismatches are reported but never block cleanliness
    /// on their own, since spec.md §4.5 says they are logged, not halted on.
    pub fn is_clean(&self) -> bool {
        self.zombies_closed.is_empty()
            && self.ghosts_closed.is_empty()
            && self.ghosts_adopted.is_empty()
            && self.broken_hedges_flattened.is_empty()
            && self.errors.is_empty()
    }
}
