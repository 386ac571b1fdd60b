//! Per-market orderbook WS task lifecycle: lazy spawn on first subscriber,
//! a circuit breaker that stops hammering a consistently-failing connection,
//! a stall health monitor (grounded on `aibysid-HyperLiquidMM::ingestor`'s
//! `is_stalled`/`STALL_TIMEOUT_SECS` pattern), reconnect with shared
//! [`crate::backoff::Backoff`], and TTL + LRU eviction once a market's
//! subscriber count drops to zero and stays there.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::backoff::{Backoff, BackoffConfig};

const STALL_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_EVICT_AFTER: Duration = Duration::from_secs(300);
const MAX_OPEN_MARKETS: usize = 64;

/// Per-market connection bookkeeping, independent of the actual WS socket —
/// the socket handle itself lives in the `JoinHandle`'s spawned task.
struct MarketConn {
    handle: JoinHandle<()>,
    last_message_at: Instant,
    consecutive_failures: u32,
    subscriber_count: u32,
    unsubscribed_since: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Open: recent consecutive failures exceeded the trip threshold; new
    /// connect attempts are refused until `reopen_after` elapses.
    Open,
}

const TRIP_THRESHOLD: u32 = 5;

/// Tracks WS lifecycle state per market (venue+symbol key supplied by the
/// caller, typically `"{venue}:{symbol}"`). Does not itself own the network
/// connection — callers supply a `connect_fn` that is spawned as a task;
/// this struct only decides *when* to spawn, tear down, or refuse to retry.
pub struct WsLifecycleManager {
    conns: Mutex<HashMap<String, MarketConn>>,
}

impl Default for WsLifecycleManager {
    fn default() -> Self {
        WsLifecycleManager {
            conns: Mutex::new(HashMap::new()),
        }
    }
}

impl WsLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily spawn `connect_fn` for `key` if not already running, bumping
    /// the subscriber refcount. Returns `true` if a new task was spawned.
    pub fn ensure_spawned<F>(&self, key: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut conns = self.conns.lock();
        if let Some(conn) = conns.get_mut(key) {
            conn.subscriber_count += 1;
            conn.unsubscribed_since = None;
            return false;
        }
        conns.insert(
            key.to_string(),
            MarketConn {
                handle: spawn(),
                last_message_at: Instant::now(),
                consecutive_failures: 0,
                subscriber_count: 1,
                unsubscribed_since: None,
            },
        );
        true
    }

    /// Drop a subscriber. Returns `true` once the refcount reaches zero
    /// (caller should leave the task running until [`evict_idle`] decides
    /// the idle grace period has elapsed — an immediate teardown would defeat
    /// rapid resubscribe-on-retry).
    pub fn release(&self, key: &str) -> bool {
        let mut conns = self.conns.lock();
        let Some(conn) = conns.get_mut(key) else {
            return false;
        };
        conn.subscriber_count = conn.subscriber_count.saturating_sub(1);
        if conn.subscriber_count == 0 {
            conn.unsubscribed_since = Some(Instant::now());
            return true;
        }
        false
    }

    pub fn touch(&self, key: &str) {
        let mut conns = self.conns.lock();
        if let Some(conn) = conns.get_mut(key) {
            conn.last_message_at = Instant::now();
            conn.consecutive_failures = 0;
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut conns = self.conns.lock();
        if let Some(conn) = conns.get_mut(key) {
            conn.consecutive_failures += 1;
        }
    }

    pub fn circuit_state(&self, key: &str) -> CircuitState {
        let conns = self.conns.lock();
        match conns.get(key) {
            Some(conn) if conn.consecutive_failures >= TRIP_THRESHOLD => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }

    pub fn is_stalled(&self, key: &str) -> bool {
        let conns = self.conns.lock();
        conns
            .get(key)
            .map(|c| c.last_message_at.elapsed() > STALL_TIMEOUT)
            .unwrap_or(true)
    }

    /// Abort and remove connections that have been unsubscribed for longer
    /// than the idle grace period, or enforce the LRU cap by evicting the
    /// least-recently-touched idle connection first when over capacity.
    pub fn evict_idle(&self) {
        let mut conns = self.conns.lock();
        let now = Instant::now();
        let expired: Vec<String> = conns
            .iter()
            .filter(|(_, c)| {
                c.unsubscribed_since
                    .map(|since| now.duration_since(since) > IDLE_EVICT_AFTER)
                    .unwrap_or(false)
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            if let Some(conn) = conns.remove(&key) {
                conn.handle.abort();
            }
        }

        if conns.len() > MAX_OPEN_MARKETS {
            let mut idle: Vec<(String, Instant)> = conns
                .iter()
                .filter(|(_, c)| c.subscriber_count == 0)
                .map(|(k, c)| (k.clone(), c.last_message_at))
                .collect();
            idle.sort_by_key(|(_, t)| *t);
            let overflow = conns.len() - MAX_OPEN_MARKETS;
            for (key, _) in idle.into_iter().take(overflow) {
                if let Some(conn) = conns.remove(&key) {
                    conn.handle.abort();
                }
            }
        }
    }

    pub fn open_market_count(&self) -> usize {
        self.conns.lock().len()
    }
}

pub fn reconnect_backoff() -> Backoff {
    Backoff::new(BackoffConfig::ws_reconnect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_task() -> JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
    }

    #[tokio::test]
    async fn first_ensure_spawned_returns_true_second_false() {
        let mgr = WsLifecycleManager::new();
        assert!(mgr.ensure_spawned("venue_a:BTC", noop_task));
        assert!(!mgr.ensure_spawned("venue_a:BTC", noop_task));
        mgr.release("venue_a:BTC");
        mgr.release("venue_a:BTC");
    }

    #[tokio::test]
    async fn release_to_zero_reports_transition() {
        let mgr = WsLifecycleManager::new();
        mgr.ensure_spawned("venue_a:BTC", noop_task);
        assert!(mgr.release("venue_a:BTC"));
    }

    #[tokio::test]
    async fn circuit_trips_after_threshold_failures() {
        let mgr = WsLifecycleManager::new();
        mgr.ensure_spawned("venue_a:BTC", noop_task);
        for _ in 0..TRIP_THRESHOLD {
            mgr.record_failure("venue_a:BTC");
        }
        assert_eq!(mgr.circuit_state("venue_a:BTC"), CircuitState::Open);
    }

    #[tokio::test]
    async fn touch_resets_failure_count() {
        let mgr = WsLifecycleManager::new();
        mgr.ensure_spawned("venue_a:BTC", noop_task);
        for _ in 0..TRIP_THRESHOLD {
            mgr.record_failure("venue_a:BTC");
        }
        mgr.touch("venue_a:BTC");
        assert_eq!(mgr.circuit_state("venue_a:BTC"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn unknown_key_is_stalled() {
        let mgr = WsLifecycleManager::new();
        assert!(mgr.is_stalled("nope"));
    }
}
