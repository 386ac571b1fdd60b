//! WS fill cache: the fast path for `get_order` and for the fill-wait
//! watcher registered before every `place_order` call (spec §5 suspension
//! point: the watcher must exist *before* submit so a cancelled task never
//! loses track of an order already in flight).
//!
//! Keyed by `(Venue, client_order_id)` since the client-assigned id is known
//! before the venue-assigned id exists; `order_id` is backfilled once known
//! via [`FillCache::link_order_id`].

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;

use fab_domain::{Order, Venue};

const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry {
    order: Option<Order>,
    inserted_at: Instant,
    watcher: Option<oneshot::Sender<Order>>,
}

/// Shared cache of terminal/latest order state plus pending fill watchers.
/// Cheap to clone (wraps `Arc`-free `DashMap` handles are not needed since
/// the cache itself is the shared handle — callers hold it behind an `Arc`).
#[derive(Default)]
pub struct FillCache {
    by_client_id: DashMap<(Venue, String), Entry>,
    order_id_to_client_id: DashMap<(Venue, String), String>,
    ttl: Option<Duration>,
}

impl FillCache {
    pub fn new() -> Self {
        FillCache {
            by_client_id: DashMap::new(),
            order_id_to_client_id: DashMap::new(),
            ttl: Some(DEFAULT_TTL),
        }
    }

    /// Register a fill watcher *before* submitting the order, per the
    /// cancellation-safety invariant. Returns the receiving half; the sender
    /// is fired by [`FillCache::record_update`] once the order reaches a
    /// terminal state.
    pub fn register_watcher(&self, venue: Venue, client_order_id: &str) -> oneshot::Receiver<Order> {
        let (tx, rx) = oneshot::channel();
        let key = (venue, client_order_id.to_string());
        match self.by_client_id.get_mut(&key) {
            Some(mut entry) => entry.watcher = Some(tx),
            None => {
                drop(self.by_client_id.insert(
                    key,
                    Entry {
                        order: None,
                        inserted_at: Instant::now(),
                        watcher: Some(tx),
                    },
                ));
            }
        }
        rx
    }

    pub fn link_order_id(&self, venue: Venue, client_order_id: &str, order_id: &str) {
        self.order_id_to_client_id
            .insert((venue, order_id.to_string()), client_order_id.to_string());
    }

    /// Record the latest observed state of an order (from WS push or REST
    /// poll). If the order just reached a terminal state and a watcher is
    /// registered, the watcher fires.
    pub fn record_update(&self, venue: Venue, order: Order) {
        let key = (venue, order.client_id.clone());
        let terminal = order.status.is_terminal();
        let mut entry = self.by_client_id.entry(key).or_insert_with(|| Entry {
            order: None,
            inserted_at: Instant::now(),
            watcher: None,
        });
        entry.order = Some(order.clone());
        if terminal {
            if let Some(tx) = entry.watcher.take() {
                let _ = tx.send(order);
            }
        }
    }

    pub fn get_by_client_id(&self, venue: Venue, client_order_id: &str) -> Option<Order> {
        self.by_client_id
            .get(&(venue, client_order_id.to_string()))
            .and_then(|e| e.order.clone())
    }

    pub fn get_by_order_id(&self, venue: Venue, order_id: &str) -> Option<Order> {
        let client_id = self
            .order_id_to_client_id
            .get(&(venue, order_id.to_string()))?
            .clone();
        self.get_by_client_id(venue, &client_id)
    }

    /// Evict entries older than the TTL. Callers run this periodically; the
    /// cache never self-evicts on a background task of its own so tests stay
    /// deterministic.
    pub fn evict_expired(&self) {
        let Some(ttl) = self.ttl else { return };
        let now = Instant::now();
        self.by_client_id
            .retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
    }

    pub fn len(&self) -> usize {
        self.by_client_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_client_id.is_empty()
    }
}
