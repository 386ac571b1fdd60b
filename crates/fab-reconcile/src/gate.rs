//! Arm/start gate and periodic drift tick, generalized from the teacher's
//! single-broker `check_arm_gate`/`check_start_gate`/`reconcile_tick` trio to
//! operate on a dual-venue [`ReconcileReport`].
//!
//! All functions here are pure: given a report, they only classify it.

use crate::types::ReconcileReport;

/// Result of an arm or start gate check. Arm/start may proceed only on
/// [`ArmStartGate::Permitted`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArmStartGate {
    Permitted,
    Blocked { report: ReconcileReport },
}

impl ArmStartGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, ArmStartGate::Permitted)
    }

    pub fn is_blocked(&self) -> bool {
        !self.is_permitted()
    }
}

/// Gate check for LIVE arm or LIVE start — reconcile MUST be clean.
pub fn check_arm_gate(report: &ReconcileReport) -> ArmStartGate {
    if report.is_clean() {
        ArmStartGate::Permitted
    } else {
        ArmStartGate::Blocked { report: report.clone() }
    }
}

/// Action prescribed by a periodic reconcile tick.
#[derive(Clone, Debug, PartialEq)]
pub enum DriftAction {
    Continue,
    /// Drift detected — the runtime must pause trading and disarm, per
    /// spec.md §4.2's broken-hedge pause semantics.
    HaltAndDisarm { report: ReconcileReport },
}

impl DriftAction {
    pub fn is_safe_to_continue(&self) -> bool {
        matches!(self, DriftAction::Continue)
    }

    pub fn requires_halt_and_disarm(&self) -> bool {
        !self.is_safe_to_continue()
    }
}

/// Periodic reconcile tick: any zombie or ghost is drift; a side mismatch
/// alone is logged but does not halt, per spec.md §4.5.
pub fn reconcile_tick(report: &ReconcileReport) -> DriftAction {
    if report.zombies.is_empty() && report.ghosts.is_empty() {
        DriftAction::Continue
    } else {
        DriftAction::HaltAndDisarm { report: report.clone() }
    }
}
