//! fab-reconcile: the Reconciliation & Safety subsystem.
//!
//! Compares the store's OPEN trades against live venue positions to find
//! zombies (an OPEN trade with no live position anywhere), ghosts (a live
//! position with no OPEN trade), broken hedges (a live position on exactly
//! one of a trade's two venues), and side mismatches (a live position whose
//! side contradicts the trade's recorded leg), per spec.md §4.5. Detection
//! (`engine`, `gate`) is pure and deterministic; remediation (`reconciler`)
//! drives the store, the event bus, and venue order placement.
//!
//! Also owns [`arm_state::ArmState`]: the system boots disarmed on every
//! restart and only an explicit, clean reconcile sweep re-arms it.

pub mod arm_state;
pub mod broken_hedge;
pub mod engine;
pub mod gate;
pub mod reconciler;
pub mod types;
pub mod watermark;

pub use arm_state::{ArmState, DisarmReason};
pub use broken_hedge::{BrokenHedgeConfig, BrokenHedgeDetector};
pub use engine::reconcile;
pub use gate::{check_arm_gate, reconcile_tick, ArmStartGate, DriftAction};
pub use reconciler::{GhostPolicy, Reconciler, ReconcilerError};
pub use types::{
    BrokenHedgeTrade, GhostPosition, LivePosition, ReconcileOutcome, ReconcileReport, SideMismatch, VenueSnapshot,
    ZombieTrade,
};
pub use watermark::{ReconcileWatermark, SnapshotFreshness, StaleSnapshot};
