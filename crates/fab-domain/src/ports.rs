//! Narrow trait "ports" standing in for external collaborators that are
//! explicitly out of scope for this core: durable persistence, an event/
//! notification sink, and opportunity discovery/ranking.
//!
//! The core never talks to a concrete database, dashboard, or scanner
//! directly — it depends only on these traits, the same way the teacher's
//! tests depend on `mqk-broker-paper` instead of a real exchange. A
//! production deployment supplies real implementations out of tree;
//! `fab-testkit` supplies in-memory ones for tests and for `fab-runtime`
//! running standalone.

use async_trait::async_trait;

use crate::events::DomainEvent;
use crate::types::{Opportunity, Trade};

/// Durable storage for Trade records. Implementations must make `upsert`
/// idempotent on `trade.id` — the execution and position engines call it at
/// every state transition, not only on creation.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn upsert(&self, trade: &Trade) -> anyhow::Result<()>;
    async fn get(&self, trade_id: &str) -> anyhow::Result<Option<Trade>>;
    async fn list_open(&self) -> anyhow::Result<Vec<Trade>>;
    async fn list_by_symbol(&self, symbol: &str) -> anyhow::Result<Vec<Trade>>;
}

/// Fan-out sink for [`DomainEvent`]s. `publish` must not block the caller on
/// a slow downstream consumer — implementations that wrap a network sink
/// should buffer or drop rather than apply backpressure to the hot execution
/// path.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Supplies ranked funding-rate opportunities. The ranking/discovery
/// algorithm itself is out of scope here; this is the single seam the
/// Execution Engine pulls through.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    async fn next_opportunity(&self) -> anyhow::Result<Option<Opportunity>>;
}
