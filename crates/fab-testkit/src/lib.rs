//! In-memory reference implementations of the `fab_domain::ports` traits,
//! for integration tests and for `fab-runtime`'s default non-persistent
//! mode. No production code should depend on this crate.

pub mod event_bus;
pub mod opportunity_source;
pub mod trade_store;

pub use event_bus::{BroadcastEventBus, RecordingEventBus};
pub use opportunity_source::QueuedOpportunitySource;
pub use trade_store::InMemoryTradeStore;
