//! Event payloads published on the [`crate::ports::EventBus`] port.
//!
//! The real sink (dashboard, telegram, audit log) is out of scope; this enum
//! is the stable contract a sink implementation would fan out on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CloseReason, Trade, TradeStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DomainEvent {
    TradeStateChanged {
        trade_id: String,
        symbol: String,
        from: TradeStatus,
        to: TradeStatus,
        at: DateTime<Utc>,
    },
    TradeClosed {
        trade_id: String,
        symbol: String,
        reason: CloseReason,
        realized_pnl_micros: i64,
        at: DateTime<Utc>,
    },
    BrokenHedge {
        trade_id: String,
        symbol: String,
        detail: String,
        at: DateTime<Utc>,
    },
    ReconcileDirty {
        detail: String,
        at: DateTime<Utc>,
    },
    ReconcileClean {
        at: DateTime<Utc>,
    },
    SystemArmed {
        at: DateTime<Utc>,
    },
    SystemDisarmed {
        reason: String,
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn trade_opened(trade: &Trade) -> Self {
        DomainEvent::TradeStateChanged {
            trade_id: trade.id.clone(),
            symbol: trade.symbol.clone(),
            from: TradeStatus::Opening,
            to: TradeStatus::Open,
            at: trade.opened_at.unwrap_or_else(Utc::now),
        }
    }
}
