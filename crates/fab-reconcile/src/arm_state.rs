//! System-wide arm state with fail-closed boot semantics.
//!
//! Generalizes the teacher's `ArmState`/`DisarmReason` pair: boot always
//! starts disarmed regardless of the last persisted value, a broken hedge or
//! reconcile drift disarms immediately, and only an explicit clean sweep
//! re-arms — matching spec.md §4.2's "resume only after a clean all-balanced
//! sweep".

use chrono::{DateTime, Utc};

/// Why the system is currently disarmed. Preserved across restarts so
/// operators can see the cause before re-arming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisarmReason {
    /// Booted without (or ignoring) a previously armed persisted state.
    BootDefault,
    /// Operator explicitly disarmed.
    ManualDisarm,
    /// A broken-hedge condition was detected on some symbol.
    BrokenHedge { symbol: String },
    /// A periodic reconcile pass found drift (zombies, ghosts, or a stale
    /// watermark) that requires remediation before resuming.
    ReconcileDrift,
}

impl std::fmt::Display for DisarmReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisarmReason::BootDefault => write!(f, "boot default"),
            DisarmReason::ManualDisarm => write!(f, "manual disarm"),
            DisarmReason::BrokenHedge { symbol } => write!(f, "broken hedge on {symbol}"),
            DisarmReason::ReconcileDrift => write!(f, "reconcile drift"),
        }
    }
}

/// The system's top-level arm state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArmState {
    Armed { since: DateTime<Utc> },
    Disarmed { reason: DisarmReason, since: DateTime<Utc> },
}

impl ArmState {
    /// Fail-closed boot: the system always starts disarmed, preserving
    /// whatever reason was persisted (or `BootDefault` if none/armed was
    /// persisted). A prior `Armed` state is never trusted across a restart.
    pub fn boot(persisted: Option<ArmState>, now: DateTime<Utc>) -> Self {
        match persisted {
            Some(ArmState::Disarmed { reason, .. }) => ArmState::Disarmed { reason, since: now },
            Some(ArmState::Armed { .. }) | None => {
                ArmState::Disarmed { reason: DisarmReason::BootDefault, since: now }
            }
        }
    }

    pub fn arm(now: DateTime<Utc>) -> Self {
        ArmState::Armed { since: now }
    }

    pub fn disarm(reason: DisarmReason, now: DateTime<Utc>) -> Self {
        ArmState::Disarmed { reason, since: now }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, ArmState::Armed { .. })
    }

    pub fn is_disarmed(&self) -> bool {
        !self.is_armed()
    }
}
