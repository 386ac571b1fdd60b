//! Exponential backoff with jitter — the single shared retry schedule used by
//! every reconnect loop, HTTP retry, and periodic reconcile cycle in the
//! workspace (`fab-venue`'s rate limiter, this crate's WS reconnect loop, and
//! `fab-reconcile`'s periodic tick all construct one of these rather than
//! hand-rolling their own delay math).
//!
//! Grounded on the reconnect loop in `aibysid-HyperLiquidMM`'s ingestor
//! (`connect_and_listen`'s `retry_delay_secs` doubling, capped at 32s), with
//! jitter added since a fleet of per-market WS tasks reconnecting in lockstep
//! after a shared outage would otherwise all redial in the same instant.

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Jitter fraction applied symmetrically around the computed delay, e.g.
    /// `0.2` means +/-20%.
    pub jitter: f64,
}

impl BackoffConfig {
    pub fn venue_premium() -> Self {
        BackoffConfig {
            base: Duration::from_secs(3),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    pub fn venue_standard() -> Self {
        BackoffConfig {
            base: Duration::from_secs(10),
            max: Duration::from_secs(120),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    pub fn ws_reconnect() -> Self {
        BackoffConfig {
            base: Duration::from_secs(1),
            max: Duration::from_secs(32),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

/// Stateful backoff counter. Call [`Backoff::next_delay`] to advance and get
/// the delay to sleep before the next attempt; call [`Backoff::reset`] on
/// success.
pub struct Backoff {
    cfg: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(cfg: BackoffConfig) -> Self {
        Backoff { cfg, attempt: 0 }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Compute the next delay and advance the internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base_secs = self.cfg.base.as_secs_f64();
        let max_secs = self.cfg.max.as_secs_f64();
        let raw = base_secs * self.cfg.multiplier.powi(self.attempt as i32);
        let capped = raw.min(max_secs);

        self.attempt = self.attempt.saturating_add(1);

        if self.cfg.jitter <= 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let mut rng = rand::thread_rng();
        let jitter_range = capped * self.cfg.jitter;
        let delta = rng.gen_range(-jitter_range..=jitter_range);
        Duration::from_secs_f64((capped + delta).max(0.0))
    }

    /// Delay for the next attempt without jitter — used by tests and by
    /// callers that want to log the deterministic schedule.
    pub fn peek_base_delay(&self) -> Duration {
        let base_secs = self.cfg.base.as_secs_f64();
        let max_secs = self.cfg.max.as_secs_f64();
        let raw = base_secs * self.cfg.multiplier.powi(self.attempt as i32);
        Duration::from_secs_f64(raw.min(max_secs))
    }
}
