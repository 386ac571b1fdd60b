//! Consecutive-hit broken-hedge tracking: the reconcile-side counterpart to
//! `fab_position::BrokenHedgeDetector`'s per-symbol sticky-halt pattern
//! (mqk-risk's "hit the threshold, latch closed, only clear on an explicit
//! clean signal" shape), scoped here to a trade id rather than a symbol
//! since the reconciler reasons about OPEN trades directly.
//!
//! A single presence/absence mismatch is often just a fill landing between
//! two snapshot fetches; spec.md §4.2 only calls it a broken hedge once the
//! mismatch survives `consecutive_hits_required` sweeps spanning at least
//! `min_observation`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct BrokenHedgeConfig {
    pub consecutive_hits_required: u32,
    pub min_observation: Duration,
    pub cooldown: Duration,
}

impl Default for BrokenHedgeConfig {
    fn default() -> Self {
        BrokenHedgeConfig {
            consecutive_hits_required: 3,
            min_observation: Duration::from_secs(45),
            cooldown: Duration::from_secs(900),
        }
    }
}

#[derive(Clone, Debug)]
struct TradeState {
    consecutive_hits: u32,
    first_hit_at: Option<Instant>,
    paused_until: Option<Instant>,
}

impl TradeState {
    fn fresh() -> Self {
        TradeState { consecutive_hits: 0, first_hit_at: None, paused_until: None }
    }
}

/// Per-trade consecutive-hit counter. The reconciler owns one instance and
/// feeds it one presence/absence verdict per trade per sweep.
pub struct BrokenHedgeDetector {
    config: BrokenHedgeConfig,
    state: HashMap<String, TradeState>,
}

impl BrokenHedgeDetector {
    pub fn new(config: BrokenHedgeConfig) -> Self {
        BrokenHedgeDetector { config, state: HashMap::new() }
    }

    pub fn cooldown(&self) -> Duration {
        self.config.cooldown
    }

    /// Record one sweep's presence/absence verdict for `trade_id`. Returns
    /// `true` the moment this observation trips the hedge into a newly
    /// paused state — the caller disarms and self-heals on that edge only,
    /// not on every subsequent sweep the trade stays broken.
    pub fn observe(&mut self, trade_id: &str, mismatched: bool, now: Instant) -> bool {
        let st = self.state.entry(trade_id.to_string()).or_insert_with(TradeState::fresh);

        if !mismatched {
            st.consecutive_hits = 0;
            st.first_hit_at = None;
            return false;
        }

        if st.consecutive_hits == 0 {
            st.first_hit_at = Some(now);
        }
        st.consecutive_hits += 1;

        let observed_long_enough =
            st.first_hit_at.map(|t| now.duration_since(t) >= self.config.min_observation).unwrap_or(false);

        if st.consecutive_hits >= self.config.consecutive_hits_required && observed_long_enough {
            let already_paused = st.paused_until.is_some();
            st.paused_until = Some(now + self.config.cooldown);
            return !already_paused;
        }
        false
    }
}
