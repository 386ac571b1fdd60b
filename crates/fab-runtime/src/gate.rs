//! Shared gate state read by every trading task and written only by the
//! periodic reconcile task, generalizing `mqk-integrity::IntegrityState`'s
//! single-writer-many-readers shape into the dual-venue gate
//! (`fab_execution::GateVerdicts`) that both opens and closes consult.
//!
//! There is no standalone risk engine in this workspace — exposure/drawdown
//! bounds are evaluated inline by `fab-position`'s exit rules rather than by
//! a separate blocking gate, so `risk_allowed` stays `true` here and exists
//! only so `GateVerdicts`' shape matches spec.md §7's error taxonomy.

use std::sync::Arc;

use fab_execution::GateVerdicts;
use fab_reconcile::ArmState;
use tokio::sync::RwLock;

pub type SharedGate = Arc<RwLock<GateVerdicts>>;

pub fn new_shared_gate() -> SharedGate {
    // Fail-closed boot: disarmed until the first clean reconcile sweep.
    Arc::new(RwLock::new(GateVerdicts {
        integrity_armed: false,
        risk_allowed: true,
        reconcile_clean: false,
    }))
}

pub async fn record_arm_state(gate: &SharedGate, arm_state: &ArmState) {
    let mut guard = gate.write().await;
    guard.integrity_armed = matches!(arm_state, ArmState::Armed { .. });
}

pub async fn record_reconcile_clean(gate: &SharedGate, clean: bool) {
    let mut guard = gate.write().await;
    guard.reconcile_clean = clean;
}

pub async fn snapshot(gate: &SharedGate) -> GateVerdicts {
    *gate.read().await
}
