//! Broken-hedge detection: a per-symbol consecutive-hit counter with a
//! minimum observation window and a cooldown, in the shape of
//! `mqk-risk`'s sticky-halt tracking (hit the threshold, latch closed,
//! only clear on an explicit clean signal) but scoped to a single symbol
//! rather than the whole book.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::PositionConfig;

#[derive(Clone, Debug)]
struct SymbolState {
    consecutive_hits: u32,
    first_hit_at: Option<Instant>,
    paused_until: Option<Instant>,
}

impl SymbolState {
    fn fresh() -> Self {
        SymbolState { consecutive_hits: 0, first_hit_at: None, paused_until: None }
    }
}

/// Tracks, per symbol, whether a trade's two legs have drifted out of
/// delta-neutrality for long enough and consistently enough to treat the
/// hedge as broken rather than transient slippage.
pub struct BrokenHedgeDetector {
    min_observation: Duration,
    consecutive_hits_required: u32,
    cooldown: Duration,
    state: HashMap<String, SymbolState>,
}

impl BrokenHedgeDetector {
    pub fn new(cfg: &PositionConfig) -> Self {
        BrokenHedgeDetector {
            min_observation: cfg.broken_hedge_min_observation,
            consecutive_hits_required: cfg.broken_hedge_consecutive_hits,
            cooldown: cfg.broken_hedge_cooldown,
            state: HashMap::new(),
        }
    }

    /// Record one delta check for `symbol`. `is_imbalanced` is the caller's
    /// verdict for this tick (drift over the Emergency delta bound, or an
    /// explicit rollback/rebalance failure). Returns `true` the moment this
    /// observation trips the hedge into a paused state.
    pub fn observe(&mut self, symbol: &str, is_imbalanced: bool, now: Instant) -> bool {
        let st = self.state.entry(symbol.to_string()).or_insert_with(SymbolState::fresh);

        if !is_imbalanced {
            st.consecutive_hits = 0;
            st.first_hit_at = None;
            return false;
        }

        if st.consecutive_hits == 0 {
            st.first_hit_at = Some(now);
        }
        st.consecutive_hits += 1;

        let observed_long_enough = st
            .first_hit_at
            .map(|t| now.duration_since(t) >= self.min_observation)
            .unwrap_or(false);

        if st.consecutive_hits >= self.consecutive_hits_required && observed_long_enough {
            let already_paused = st.paused_until.is_some();
            st.paused_until = Some(now + self.cooldown);
            return !already_paused;
        }
        false
    }

    /// Whether new entries on `symbol` should be withheld right now.
    pub fn is_trading_paused(&self, symbol: &str, now: Instant) -> bool {
        self.state
            .get(symbol)
            .and_then(|st| st.paused_until)
            .map(|until| now < until)
            .unwrap_or(false)
    }

    /// Clears the pause for `symbol` once a reconcile sweep comes back clean
    /// for it, independent of whether the cooldown has elapsed yet — a clean
    /// all-balanced sweep is stronger evidence than a timer.
    pub fn resume_if_clean(&mut self, symbol: &str) {
        if let Some(st) = self.state.get_mut(symbol) {
            st.consecutive_hits = 0;
            st.first_hit_at = None;
            st.paused_until = None;
        }
    }
}
