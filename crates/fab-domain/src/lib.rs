//! Shared domain vocabulary for the funding-rate arbitrage core: fixed-point
//! numerics, the Trade/Order/Opportunity data model, domain events, and the
//! narrow trait ports through which every other crate reaches out-of-scope
//! external collaborators (persistence, notification, opportunity scanning).

pub mod events;
pub mod fixedpoint;
pub mod locks;
pub mod ports;
pub mod types;

pub use events::DomainEvent;
pub use fixedpoint::{Micros, PricingError};
pub use locks::SymbolLockTable;
pub use ports::{EventBus, OpportunitySource, TradeStore};
pub use types::{
    AttemptStage, AttemptStatus, BookLevel, CloseReason, ExecutionAttempt, ExecutionState, Opportunity,
    Order, OrderStatus, OrderType, OrderbookSnapshot, Side, TimeInForce, Trade, TradeLeg, TradeStatus,
    Venue,
};
