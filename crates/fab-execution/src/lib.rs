//! fab-execution: the Execution Engine subsystem.
//!
//! Owns the open side of a delta-neutral pair: turning an `Opportunity` into
//! two filled legs across the two venues, or failing the attempt cleanly.
//! Every venue call is forced through [`gateway::ExecutionGateway`], the
//! single choke-point gating on integrity/risk/reconcile state. The close
//! side (exit rules, coordinated/sequential close, rebalance) lives in
//! `fab-position`; this crate only opens trades.

pub mod engine;
pub mod gateway;
pub mod oms;
pub mod reconcile_guard;
pub mod types;

pub use engine::{ExecutionConfig, ExecutionEngine};
pub use gateway::{trade_leg_client_order_id, ExecutionGateway, GateRefusal, GateVerdicts, GatewayError};
pub use reconcile_guard::ReconcileFreshnessGuard;
pub use types::{notional_ok, ExecutionError, LegPlan, PREFLIGHT_NOTIONAL_TOLERANCE};
