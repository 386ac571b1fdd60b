//! The main supervisor: wires the per-task tokio loops enumerated in
//! spec.md §5 together — the opportunity/execution loop, the periodic
//! position-maintenance loop, the periodic reconcile loop, and a background
//! rollback/escalation processor fed by an unbounded `mpsc` channel with a
//! single consumer task, mirroring `mqk-daemon::state::spawn_heartbeat`'s
//! "one task owns the tick, everyone else reads a shared handle" shape.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fab_domain::ports::OpportunitySource;
use fab_domain::CloseReason;
use fab_execution::ExecutionEngine;
use fab_position::PositionManager;
use fab_reconcile::Reconciler;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinError;

use crate::gate::{record_arm_state, record_reconcile_clean, snapshot, SharedGate};

/// A failed execution attempt, handed off for out-of-band logging so a slow
/// consumer never blocks the opportunity loop from picking up the next
/// candidate. `ExecutionEngine::execute` has already driven any rollback to
/// completion (and published `DomainEvent::BrokenHedge` itself if the
/// rollback flatten failed) by the time a job lands here.
pub struct RollbackJob {
    pub symbol: String,
    pub detail: String,
}

pub struct ShutdownConfig {
    pub close_positions_on_exit: bool,
    pub timeout: Duration,
}

pub struct Supervisor {
    pub execution: Arc<ExecutionEngine>,
    pub position: Arc<Mutex<PositionManager>>,
    pub reconciler: Reconciler,
    pub opportunities: Arc<dyn OpportunitySource>,
    pub gate: SharedGate,
    pub reconcile_interval: Duration,
    pub position_check_interval: Duration,
    pub shutdown: ShutdownConfig,
}

impl Supervisor {
    pub async fn run(self) -> Result<()> {
        let rollback_tx = spawn_rollback_processor();

        let mut reconcile_handle = tokio::spawn(run_reconcile_loop(
            self.reconciler,
            Arc::clone(&self.gate),
            self.reconcile_interval,
        ));

        let mut position_handle = tokio::spawn(run_position_loop(
            Arc::clone(&self.position),
            Arc::clone(&self.gate),
            self.position_check_interval,
        ));

        let mut execution_handle = tokio::spawn(run_opportunity_loop(
            self.execution,
            self.opportunities,
            Arc::clone(&self.gate),
            rollback_tx,
        ));

        // None of the three loops above ever return on their own (each is an
        // unconditional `loop`); a `JoinHandle` resolving here only happens on
        // panic. Per spec.md's propagation policy that is the one failure
        // this supervisor treats as fatal rather than logging and continuing.
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                tracing::info!("shutdown signal received, stopping background tasks");
            }
            join_result = &mut reconcile_handle => {
                log_fatal_task_exit("reconcile", join_result);
            }
            join_result = &mut position_handle => {
                log_fatal_task_exit("position maintenance", join_result);
            }
            join_result = &mut execution_handle => {
                log_fatal_task_exit("opportunity/execution", join_result);
            }
        }

        reconcile_handle.abort();
        position_handle.abort();
        execution_handle.abort();

        if self.shutdown.close_positions_on_exit {
            let verdicts = snapshot(&self.gate).await;
            let mut manager = self.position.lock().await;
            match tokio::time::timeout(
                self.shutdown.timeout,
                manager.force_close_all(CloseReason::OperatorForced, &verdicts),
            )
            .await
            {
                Ok(closed) => tracing::info!(count = closed.len(), "closed open trades on exit"),
                Err(_) => tracing::error!("timed out closing open trades on exit; positions may remain open"),
            }
        }

        Ok(())
    }
}

async fn run_reconcile_loop(mut reconciler: Reconciler, gate: SharedGate, interval: Duration) {
    let mut startup = true;
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let verdicts = snapshot(&gate).await;
        match reconciler.run(startup, &verdicts).await {
            Ok(outcome) => {
                record_arm_state(&gate, reconciler.arm_state()).await;
                record_reconcile_clean(&gate, outcome.is_clean()).await;
            }
            Err(e) => tracing::error!(error = %e, "reconcile pass failed"),
        }
        startup = false;
    }
}

async fn run_position_loop(manager: Arc<Mutex<PositionManager>>, gate: SharedGate, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let verdicts = snapshot(&gate).await;
        let mut manager = manager.lock().await;
        match manager.check_trades(&verdicts).await {
            Ok(closed) if !closed.is_empty() => {
                tracing::info!(count = closed.len(), "closed trades during maintenance pass")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "position maintenance pass failed"),
        }
    }
}

async fn run_opportunity_loop(
    execution: Arc<ExecutionEngine>,
    opportunities: Arc<dyn OpportunitySource>,
    gate: SharedGate,
    rollback_tx: mpsc::UnboundedSender<RollbackJob>,
) {
    loop {
        match opportunities.next_opportunity().await {
            Ok(Some(opp)) if opp.is_valid() => {
                let verdicts = snapshot(&gate).await;
                if !verdicts.integrity_armed {
                    tracing::debug!(symbol = %opp.symbol, "skipping opportunity while disarmed");
                    continue;
                }
                let symbol = opp.symbol.clone();
                match execution.execute(opp, verdicts).await {
                    Ok(trade) => tracing::info!(trade_id = %trade.id, symbol = %symbol, "opened trade"),
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "execution attempt failed");
                        let _ = rollback_tx.send(RollbackJob { symbol, detail: e.to_string() });
                    }
                }
            }
            Ok(Some(_)) => {
                // Opportunity failed is_valid() — the source is expected to
                // filter these, but the gate here guards against a stale
                // snapshot sneaking through.
            }
            Ok(None) => tokio::time::sleep(Duration::from_millis(250)).await,
            Err(e) => {
                tracing::error!(error = %e, "opportunity source error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// One of the supervised loops exited, which only happens via panic since
/// each loop body is an unconditional `loop {}`. Logged at error level; the
/// caller still drives the same abort-and-drain shutdown path used for an
/// operator-requested stop.
fn log_fatal_task_exit(name: &str, join_result: std::result::Result<(), JoinError>) {
    match join_result {
        Ok(()) => tracing::error!(task = name, "supervised task returned unexpectedly"),
        Err(e) => tracing::error!(task = name, error = %e, "supervised task panicked"),
    }
}

fn spawn_rollback_processor() -> mpsc::UnboundedSender<RollbackJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RollbackJob>();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            tracing::error!(symbol = %job.symbol, detail = %job.detail, "execution attempt escalated to rollback processor");
        }
    });
    tx
}
