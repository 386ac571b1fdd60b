//! Market data ingestion and orderbook maintenance: local per-venue books
//! with nonce-continuity validation, a cross-venue staleness-aware cache,
//! the WS fill cache backing `get_order`/fill-wait, per-market WS lifecycle
//! management, and the shared backoff utility every reconnect/retry loop in
//! the workspace reuses.

pub mod backoff;
pub mod fill_cache;
pub mod orderbook;
pub mod service;
pub mod wire;
pub mod ws_lifecycle;

pub use backoff::{Backoff, BackoffConfig};
pub use fill_cache::FillCache;
pub use orderbook::{ApplyOutcome, BookUpdate, LocalOrderbook};
pub use service::{MarketDataService, SharedMarketDataService, StalenessConfig};
pub use wire::{OrderUpdateEvent, OrderbookWireMessage, SendTxAck};
pub use ws_lifecycle::{CircuitState, WsLifecycleManager};
