//! Market metadata cache: tick size, step size, min qty, min notional,
//! maker/taker fee, max leverage. TTL ~1h (tier-dependent), refreshed
//! lazily on next access past expiry rather than on a background timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::adapter::AccountTier;

#[derive(Clone, Debug)]
pub struct MarketMetadata {
    pub tick_size: fab_domain::Micros,
    pub step_size: i64,
    pub min_qty: i64,
    pub min_notional: fab_domain::Micros,
    pub maker_fee_bps: f64,
    pub taker_fee_bps: f64,
    pub max_leverage: u32,
}

struct CachedEntry {
    metadata: MarketMetadata,
    fetched_at: Instant,
}

fn ttl_for(tier: AccountTier) -> Duration {
    match tier {
        AccountTier::Premium => Duration::from_secs(3600),
        AccountTier::Standard => Duration::from_secs(2700),
    }
}

pub struct MarketMetadataCache {
    tier: AccountTier,
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl MarketMetadataCache {
    pub fn new(tier: AccountTier) -> Self {
        MarketMetadataCache {
            tier,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<MarketMetadata> {
        let entries = self.entries.read();
        let entry = entries.get(symbol)?;
        if entry.fetched_at.elapsed() > ttl_for(self.tier) {
            return None;
        }
        Some(entry.metadata.clone())
    }

    pub fn put(&self, symbol: &str, metadata: MarketMetadata) {
        self.entries.write().insert(
            symbol.to_string(),
            CachedEntry {
                metadata,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Quantize a raw target quantity down to the market's step size.
    pub fn quantize_qty(&self, symbol: &str, raw_qty: i64) -> Option<i64> {
        let meta = self.get(symbol)?;
        if meta.step_size <= 0 {
            return Some(raw_qty);
        }
        Some((raw_qty / meta.step_size) * meta.step_size)
    }
}
