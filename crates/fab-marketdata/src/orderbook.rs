//! Local per-venue-per-symbol orderbook with nonce-continuity validation.
//!
//! Updates are totally ordered by `nonce` per spec §5 "Ordering guarantees".
//! A gap (`update.begin_nonce != book.nonce`) invalidates the book and
//! forces a resync from the next snapshot, the same shape as `mqk-md`'s
//! `quality::build_quality_report` gap detection applied to a live stream
//! instead of historical bars.

use fab_domain::{BookLevel, Micros};

#[derive(Clone, Debug)]
pub struct BookUpdate {
    pub begin_nonce: u64,
    pub end_nonce: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    /// `true` for a full snapshot that replaces the book outright; `false`
    /// for an incremental diff applied on top of the current levels.
    pub is_snapshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Nonce gap detected; book invalidated and must be resynced from a
    /// fresh snapshot before further incremental updates are accepted.
    GapDetected,
}

/// A single venue+symbol local book, maintained as sorted bid/ask ladders.
#[derive(Clone, Debug, Default)]
pub struct LocalOrderbook {
    pub symbol: String,
    /// Descending by price (best bid first).
    bids: Vec<BookLevel>,
    /// Ascending by price (best ask first).
    asks: Vec<BookLevel>,
    nonce: u64,
    valid: bool,
}

impl LocalOrderbook {
    pub fn new(symbol: impl Into<String>) -> Self {
        LocalOrderbook {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            nonce: 0,
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.valid.then(|| self.bids.first().copied()).flatten()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.valid.then(|| self.asks.first().copied()).flatten()
    }

    /// Apply an update. A snapshot always succeeds and reseeds `nonce`.
    /// An incremental update is rejected (book invalidated) if its
    /// `begin_nonce` does not match the book's current nonce.
    pub fn apply(&mut self, update: BookUpdate) -> ApplyOutcome {
        if update.is_snapshot {
            self.bids = update.bids;
            self.asks = update.asks;
            self.sort_levels();
            self.nonce = update.end_nonce;
            self.valid = true;
            return ApplyOutcome::Applied;
        }

        if !self.valid || update.begin_nonce != self.nonce {
            self.valid = false;
            return ApplyOutcome::GapDetected;
        }

        merge_levels(&mut self.bids, update.bids, true);
        merge_levels(&mut self.asks, update.asks, false);
        self.nonce = update.end_nonce;
        ApplyOutcome::Applied
    }

    fn sort_levels(&mut self) {
        self.bids
            .sort_by(|a, b| b.price.raw().cmp(&a.price.raw()));
        self.asks
            .sort_by(|a, b| a.price.raw().cmp(&b.price.raw()));
    }

    /// `true` unless the book is invalid or its top-of-book is crossed
    /// (bid >= ask), matching [`fab_domain::OrderbookSnapshot::is_internally_consistent`].
    pub fn is_consistent(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => self.valid && b.price < a.price,
            _ => self.valid,
        }
    }

    /// Approximate VWAP to fill `qty` by walking the book from the top.
    /// Returns `None` if the book can't fill the full quantity.
    pub fn vwap_for_qty(&self, side_is_buy: bool, qty: i64) -> Option<Micros> {
        let levels: &[BookLevel] = if side_is_buy { &self.asks } else { &self.bids };
        let mut remaining = qty;
        let mut notional = Micros::ZERO;
        for level in levels {
            if remaining <= 0 {
                break;
            }
            let take = remaining.min(level.qty);
            notional = notional.saturating_add(level.price.checked_mul_qty(take)?);
            remaining -= take;
        }
        if remaining > 0 {
            return None;
        }
        Some(Micros::new(notional.raw() / qty.max(1)))
    }
}

/// Upsert `diffs` into `levels` (replace price level, remove if qty==0), then
/// re-sort so the book's ordering invariant holds after an incremental apply.
fn merge_levels(levels: &mut Vec<BookLevel>, diffs: Vec<BookLevel>, is_bid: bool) {
    for diff in diffs {
        if let Some(pos) = levels.iter().position(|l| l.price == diff.price) {
            if diff.qty == 0 {
                levels.remove(pos);
            } else {
                levels[pos] = diff;
            }
        } else if diff.qty > 0 {
            levels.push(diff);
        }
    }
    if is_bid {
        levels.sort_by(|a, b| b.price.raw().cmp(&a.price.raw()));
    } else {
        levels.sort_by(|a, b| a.price.raw().cmp(&b.price.raw()));
    }
}
