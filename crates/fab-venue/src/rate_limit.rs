//! Per-account request pacing and token lifecycle, per spec §4.4.
//!
//! Requests are serialized through a single lock (a sliding window counter),
//! budgeted at 85% of the venue's documented per-minute limit to leave
//! headroom. Rate-limit responses (429) feed into
//! [`fab_marketdata::Backoff`] — the single shared retry schedule — rather
//! than a locally hand-rolled delay.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use fab_marketdata::{Backoff, BackoffConfig};

use crate::adapter::AccountTier;

fn budget_per_min(tier: AccountTier) -> f64 {
    match tier {
        AccountTier::Standard => 51.0,
        AccountTier::Premium => 68.0,
    }
}

fn backoff_config(tier: AccountTier) -> BackoffConfig {
    match tier {
        AccountTier::Standard => BackoffConfig::venue_standard(),
        AccountTier::Premium => BackoffConfig::venue_premium(),
    }
}

struct Window {
    /// Timestamps of requests within the trailing 60s window.
    timestamps: Vec<Instant>,
}

/// Sliding-window request pacer, one per venue account.
pub struct RateLimiter {
    tier: AccountTier,
    window: Mutex<Window>,
    backoff: Mutex<Backoff>,
}

impl RateLimiter {
    pub fn new(tier: AccountTier) -> Self {
        RateLimiter {
            tier,
            window: Mutex::new(Window { timestamps: Vec::new() }),
            backoff: Mutex::new(Backoff::new(backoff_config(tier))),
        }
    }

    /// Block until a request slot is available under the 85%-of-budget
    /// pacing rule, then record the slot as consumed.
    pub async fn acquire(&self) {
        let budget = budget_per_min(self.tier) * 0.85;
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                window.timestamps.retain(|t| now.duration_since(*t) < Duration::from_secs(60));
                if (window.timestamps.len() as f64) < budget {
                    window.timestamps.push(now);
                    None
                } else {
                    let oldest = window.timestamps[0];
                    Some(Duration::from_secs(60).saturating_sub(now.duration_since(oldest)))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Called after a 429/5xx; returns the backoff delay the caller should
    /// sleep before retrying, and advances the shared schedule.
    pub async fn backoff_delay(&self) -> Duration {
        self.backoff.lock().await.next_delay()
    }

    pub async fn reset_backoff(&self) {
        self.backoff.lock().await.reset();
    }
}

/// Proactive token refresh when age exceeds 7h (8h documented expiry);
/// reactive single-retry refresh on 401.
pub struct TokenManager {
    issued_at: Mutex<Option<Instant>>,
}

const PROACTIVE_REFRESH_AGE: Duration = Duration::from_secs(7 * 3600);

impl Default for TokenManager {
    fn default() -> Self {
        TokenManager {
            issued_at: Mutex::new(None),
        }
    }
}

impl TokenManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_issued(&self) {
        *self.issued_at.lock().await = Some(Instant::now());
    }

    /// `true` if the current token is old enough to warrant a proactive
    /// refresh before the next request, or if no token has been issued yet.
    pub async fn needs_proactive_refresh(&self) -> bool {
        match *self.issued_at.lock().await {
            Some(issued) => issued.elapsed() > PROACTIVE_REFRESH_AGE,
            None => true,
        }
    }
}
