//! `MarketDataService`: fan-in cache over per-market orderbook subscriptions.
//!
//! Owns the L1/depth cache, staleness thresholds, and the merge policy that
//! protects a cross-venue spread calculation from a single stale or
//! momentarily-inverted venue update. WS connection lifecycle itself
//! (lazy spawn, circuit breaker, reconnect) lives in [`crate::ws_lifecycle`];
//! this module is the read-side consumers call into.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use fab_domain::{BookLevel, OrderbookSnapshot, Venue};

use crate::orderbook::LocalOrderbook;

#[derive(Clone, Copy, Debug)]
pub struct StalenessConfig {
    pub max_age: Duration,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        StalenessConfig {
            max_age: Duration::from_secs(5),
        }
    }
}

struct VenueBookState {
    book: LocalOrderbook,
    last_update: Instant,
    /// Last known-good (bid, ask) pair kept even after the book invalidates,
    /// so a transient gap doesn't zero out the spread calculation — only a
    /// staleness timeout does. Matches the "keep previous non-zero, detect
    /// inverted spread rollback" merge policy.
    last_good: Option<(BookLevel, BookLevel)>,
}

impl VenueBookState {
    fn new(symbol: &str) -> Self {
        VenueBookState {
            book: LocalOrderbook::new(symbol),
            last_update: Instant::now(),
            last_good: None,
        }
    }
}

struct SymbolState {
    venue_a: VenueBookState,
    venue_b: VenueBookState,
    /// Reference count of subscribers (Execution Engine preflight + Position
    /// Manager open trades) so the underlying WS subscription is torn down
    /// only once nobody needs it.
    subscriber_count: u32,
}

pub struct MarketDataService {
    symbols: RwLock<HashMap<String, SymbolState>>,
    staleness: StalenessConfig,
}

impl MarketDataService {
    pub fn new(staleness: StalenessConfig) -> Self {
        MarketDataService {
            symbols: RwLock::new(HashMap::new()),
            staleness,
        }
    }

    /// Ref-counted subscribe: the first subscriber for a symbol triggers the
    /// caller to lazily spawn the WS task (via [`crate::ws_lifecycle`]);
    /// returns `true` when this call transitioned 0 -> 1.
    pub fn subscribe(&self, symbol: &str) -> bool {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(symbol.to_string()).or_insert_with(|| SymbolState {
            venue_a: VenueBookState::new(symbol),
            venue_b: VenueBookState::new(symbol),
            subscriber_count: 0,
        });
        entry.subscriber_count += 1;
        entry.subscriber_count == 1
    }

    /// Returns `true` when this call transitioned the refcount to 0, meaning
    /// the caller should tear down the underlying WS subscription.
    pub fn unsubscribe(&self, symbol: &str) -> bool {
        let mut symbols = self.symbols.write();
        let Some(entry) = symbols.get_mut(symbol) else {
            return false;
        };
        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        entry.subscriber_count == 0
    }

    pub fn apply_update(&self, symbol: &str, venue: Venue, update: crate::orderbook::BookUpdate) {
        let mut symbols = self.symbols.write();
        let Some(entry) = symbols.get_mut(symbol) else {
            return;
        };
        let state = match venue {
            Venue::VenueA => &mut entry.venue_a,
            Venue::VenueB => &mut entry.venue_b,
        };
        state.book.apply(update);
        state.last_update = Instant::now();
        if let (Some(bid), Some(ask)) = (state.book.best_bid(), state.book.best_ask()) {
            if bid.price < ask.price {
                state.last_good = Some((bid, ask));
            }
        }
    }

    fn is_fresh(&self, state: &VenueBookState) -> bool {
        state.last_update.elapsed() < self.staleness.max_age
    }

    /// Build the cross-venue snapshot consumers read for spread checks.
    /// A venue side is omitted (`None`) when its book is stale even if a
    /// `last_good` value exists — staleness always wins over merge policy.
    pub fn snapshot(&self, symbol: &str) -> OrderbookSnapshot {
        let symbols = self.symbols.read();
        let mut snap = OrderbookSnapshot::empty(symbol);
        let Some(entry) = symbols.get(symbol) else {
            return snap;
        };

        if self.is_fresh(&entry.venue_a) {
            if let Some((bid, ask)) = entry.venue_a.last_good {
                snap.venue_a_bid = Some(bid);
                snap.venue_a_ask = Some(ask);
                snap.venue_a_updated_at = Some(chrono::Utc::now());
            }
        }
        if self.is_fresh(&entry.venue_b) {
            if let Some((bid, ask)) = entry.venue_b.last_good {
                snap.venue_b_bid = Some(bid);
                snap.venue_b_ask = Some(ask);
                snap.venue_b_updated_at = Some(chrono::Utc::now());
            }
        }
        snap
    }

    pub fn is_stale(&self, symbol: &str, venue: Venue) -> bool {
        let symbols = self.symbols.read();
        let Some(entry) = symbols.get(symbol) else {
            return true;
        };
        let state = match venue {
            Venue::VenueA => &entry.venue_a,
            Venue::VenueB => &entry.venue_b,
        };
        !self.is_fresh(state)
    }

    pub fn active_symbol_count(&self) -> usize {
        self.symbols.read().len()
    }
}

pub type SharedMarketDataService = Arc<MarketDataService>;
