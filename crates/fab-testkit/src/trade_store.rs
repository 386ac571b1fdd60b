//! In-memory [`TradeStore`] for tests and for `fab-runtime`'s default
//! non-persistent mode.

use std::sync::Mutex;

use async_trait::async_trait;
use fab_domain::ports::TradeStore;
use fab_domain::Trade;

#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: Mutex<Vec<Trade>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        InMemoryTradeStore { trades: Mutex::new(Vec::new()) }
    }

    pub fn seeded(trades: Vec<Trade>) -> Self {
        InMemoryTradeStore { trades: Mutex::new(trades) }
    }

    /// Snapshot of every trade currently held, open or closed. Exposed for
    /// test assertions that need more than the `TradeStore` trait's surface.
    pub fn all(&self) -> Vec<Trade> {
        self.trades.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn upsert(&self, trade: &Trade) -> anyhow::Result<()> {
        let mut trades = self.trades.lock().unwrap();
        match trades.iter_mut().find(|t| t.id == trade.id) {
            Some(existing) => *existing = trade.clone(),
            None => trades.push(trade.clone()),
        }
        Ok(())
    }

    async fn get(&self, trade_id: &str) -> anyhow::Result<Option<Trade>> {
        Ok(self.trades.lock().unwrap().iter().find(|t| t.id == trade_id).cloned())
    }

    async fn list_open(&self) -> anyhow::Result<Vec<Trade>> {
        Ok(self.trades.lock().unwrap().iter().filter(|t| t.is_open()).cloned().collect())
    }

    async fn list_by_symbol(&self, symbol: &str) -> anyhow::Result<Vec<Trade>> {
        Ok(self.trades.lock().unwrap().iter().filter(|t| t.symbol == symbol).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fab_domain::{ExecutionState, Micros, Side, TradeLeg, TradeStatus, Venue};

    fn trade(id: &str, status: TradeStatus) -> Trade {
        let now = Utc::now();
        Trade {
            id: id.into(),
            symbol: "BTC".into(),
            status,
            execution_state: ExecutionState::Complete,
            leg1: TradeLeg::new(Venue::VenueA, Side::Long, 1),
            leg2: TradeLeg::new(Venue::VenueB, Side::Short, 1),
            target_qty: 1,
            target_notional: Micros::ZERO,
            entry_apy: 0.1,
            created_at: now,
            opened_at: Some(now),
            closed_at: None,
            realized_pnl: Micros::ZERO,
            funding_collected: Micros::ZERO,
            close_reason: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_id() {
        let store = InMemoryTradeStore::new();
        store.upsert(&trade("t1", TradeStatus::Open)).await.unwrap();
        let mut updated = trade("t1", TradeStatus::Open);
        updated.entry_apy = 0.5;
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get("t1").await.unwrap().unwrap().entry_apy, 0.5);
    }

    #[tokio::test]
    async fn list_open_excludes_closed_trades() {
        let store = InMemoryTradeStore::seeded(vec![trade("open", TradeStatus::Open), trade("closed", TradeStatus::Closed)]);
        let open = store.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "open");
    }

    #[tokio::test]
    async fn list_by_symbol_filters_on_symbol() {
        let mut other = trade("t2", TradeStatus::Open);
        other.symbol = "ETH".into();
        let store = InMemoryTradeStore::seeded(vec![trade("t1", TradeStatus::Open), other]);
        let btc = store.list_by_symbol("BTC").await.unwrap();
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].id, "t1");
    }
}
