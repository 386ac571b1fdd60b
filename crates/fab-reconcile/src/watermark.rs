//! Snapshot monotonicity watermark, tracked per venue.
//!
//! # Invariants
//!
//! - **Non-decreasing per venue**: a venue's snapshot is accepted only if
//!   its `fetched_at_ms` is ≥ the last accepted snapshot's `fetched_at_ms`
//!   for that same venue.
//! - **No-timestamp → stale**: `fetched_at_ms == 0` is always rejected
//!   (fail-closed).
//! - **Watermark advances only on acceptance**: rejections never move it.

use std::collections::HashMap;

use fab_domain::Venue;

use crate::types::VenueSnapshot;

/// Result of checking a [`VenueSnapshot`] against its venue's watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotFreshness {
    /// Timestamp is ≥ the watermark for this venue.
    Fresh,
    /// Timestamp is strictly older than the last accepted snapshot for this
    /// venue.
    Stale { watermark_ms: i64, got_ms: i64 },
    /// Snapshot has no timestamp (`fetched_at_ms == 0`).
    NoTimestamp,
}

impl SnapshotFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, SnapshotFreshness::Fresh)
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_fresh()
    }
}

impl std::fmt::Display for SnapshotFreshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotFreshness::Fresh => write!(f, "fresh"),
            SnapshotFreshness::Stale { watermark_ms, got_ms } => {
                write!(f, "stale snapshot rejected: watermark={watermark_ms}ms got={got_ms}ms")
            }
            SnapshotFreshness::NoTimestamp => write!(f, "snapshot has no timestamp, rejected under fail-closed semantics"),
        }
    }
}

/// Error returned by [`ReconcileWatermark::accept_all`] when any venue's
/// snapshot fails the freshness check.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("stale snapshot for {venue}: {freshness}")]
pub struct StaleSnapshot {
    pub venue: Venue,
    pub freshness: SnapshotFreshness,
}

/// Tracks the last accepted snapshot timestamp per venue.
#[derive(Clone, Debug, Default)]
pub struct ReconcileWatermark {
    last_accepted_ms: HashMap<Venue, i64>,
}

impl ReconcileWatermark {
    pub fn new() -> Self {
        ReconcileWatermark { last_accepted_ms: HashMap::new() }
    }

    fn watermark_for(&self, venue: Venue) -> i64 {
        *self.last_accepted_ms.get(&venue).unwrap_or(&i64::MIN)
    }

    /// Check freshness without advancing the watermark.
    pub fn check(&self, snap: &VenueSnapshot) -> SnapshotFreshness {
        if snap.fetched_at_ms == 0 {
            return SnapshotFreshness::NoTimestamp;
        }
        let watermark_ms = self.watermark_for(snap.venue);
        if snap.fetched_at_ms < watermark_ms {
            return SnapshotFreshness::Stale { watermark_ms, got_ms: snap.fetched_at_ms };
        }
        SnapshotFreshness::Fresh
    }

    /// Check freshness and advance the per-venue watermark on acceptance.
    pub fn accept(&mut self, snap: &VenueSnapshot) -> SnapshotFreshness {
        let result = self.check(snap);
        if result.is_fresh() {
            self.last_accepted_ms.insert(snap.venue, snap.fetched_at_ms);
        }
        result
    }

    /// Accept both venue snapshots for a reconcile pass. Fails closed on the
    /// first stale/untimed snapshot — no content comparison runs until both
    /// venues have passed their freshness check.
    pub fn accept_all(&mut self, snapshots: &[VenueSnapshot]) -> Result<(), StaleSnapshot> {
        for snap in snapshots {
            let freshness = self.accept(snap);
            if freshness.is_rejected() {
                return Err(StaleSnapshot { venue: snap.venue, freshness });
            }
        }
        Ok(())
    }

    pub fn last_accepted_ms(&self, venue: Venue) -> i64 {
        self.watermark_for(venue)
    }
}
