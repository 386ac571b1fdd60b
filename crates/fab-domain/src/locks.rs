//! Per-symbol mutual exclusion, translated from the Python original's
//! `self._locks: dict[str, asyncio.Lock]` (original_source
//! `services/execution.py`, `services/positions/manager.py`) into
//! `tokio::sync::Mutex` keyed by symbol.
//!
//! A Trade is owned by at most one task at a time (spec §3 "Ownership").
//! Execution (open) and Position Manager (close/manage) each keep their own
//! [`SymbolLockTable`] instance so that an in-flight open on symbol `X` never
//! blocks a close evaluation tick on a *different* symbol, while still
//! serializing same-symbol open/close against each other when both tables are
//! consulted via [`SymbolLockTable::lock`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily-created per-symbol locks. The outer map is guarded by a
/// `parking_lot::Mutex` for cheap synchronous entry lookup; the per-symbol
/// lock itself is an async `tokio::sync::Mutex` held across `.await` points.
#[derive(Default)]
pub struct SymbolLockTable {
    locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SymbolLockTable {
    pub fn new() -> Self {
        SymbolLockTable::default()
    }

    fn entry(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the per-symbol lock. The returned guard holds the symbol
    /// locked until dropped; callers hold it for the duration of an
    /// open/close attempt, not across multiple independent operations.
    pub async fn lock(&self, symbol: &str) -> OwnedMutexGuard<()> {
        self.entry(symbol).lock_owned().await
    }

    /// Number of distinct symbols that have ever been locked through this
    /// table. Used only by tests and diagnostics; entries are never evicted
    /// since the symbol universe is small and bounded.
    pub fn known_symbol_count(&self) -> usize {
        self.locks.lock().len()
    }
}
