//! The IO-driving half of reconciliation: fetches live venue state, runs the
//! pure [`crate::engine::reconcile`] comparison, and remediates what it
//! finds. Split from `engine`/`gate` the same way `fab_position` splits its
//! pure `exit_rules` from its IO-driving `manager` — the detection logic is
//! trivially testable, the remediation logic needs real adapters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fab_domain::ports::{EventBus, TradeStore};
use fab_domain::{CloseReason, DomainEvent, OrderType, TimeInForce, Venue};
use fab_execution::{ExecutionGateway, GateVerdicts};
use fab_venue::{PlaceOrderRequest, VenueAdapter};

use crate::arm_state::{ArmState, DisarmReason};
use crate::broken_hedge::{BrokenHedgeConfig, BrokenHedgeDetector};
use crate::engine::reconcile;
use crate::gate::{reconcile_tick, DriftAction};
use crate::types::{BrokenHedgeTrade, GhostPosition, LivePosition, ReconcileOutcome, VenueSnapshot};
use crate::watermark::ReconcileWatermark;

#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("venue error while fetching positions: {0}")]
    Venue(#[from] fab_venue::VenueError),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Whether a ghost position is flattened (closed out on the venue) or
/// adopted into a new Trade record. Adoption is feature-flagged per
/// spec.md §4.5 and requires both legs to be present and delta-neutral
/// within tolerance — this reconciler never attempts adoption on its own,
/// since a single-venue ghost can never satisfy that requirement; adoption
/// is left to an explicit operator action outside this sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostPolicy {
    Flatten,
    AdoptIfPaired,
}

pub struct Reconciler {
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    trade_store: Arc<dyn TradeStore>,
    events: Arc<dyn EventBus>,
    gateway: ExecutionGateway,
    watermark: ReconcileWatermark,
    arm_state: ArmState,
    ghost_policy: GhostPolicy,
    broken_hedge: BrokenHedgeDetector,
    broken_hedge_cooldown_until: Option<Instant>,
}

impl Reconciler {
    pub fn new(
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        trade_store: Arc<dyn TradeStore>,
        events: Arc<dyn EventBus>,
        ghost_policy: GhostPolicy,
        broken_hedge_config: BrokenHedgeConfig,
    ) -> Self {
        Reconciler {
            venue_a,
            venue_b,
            trade_store,
            events,
            gateway: ExecutionGateway::new(),
            watermark: ReconcileWatermark::new(),
            arm_state: ArmState::boot(None, Utc::now()),
            ghost_policy,
            broken_hedge: BrokenHedgeDetector::new(broken_hedge_config),
            broken_hedge_cooldown_until: None,
        }
    }

    pub fn arm_state(&self) -> &ArmState {
        &self.arm_state
    }

    async fn fetch_snapshot(&self, adapter: &Arc<dyn VenueAdapter>, venue: Venue) -> Result<VenueSnapshot, ReconcilerError> {
        let positions = adapter.list_positions().await?;
        let mut map = BTreeMap::new();
        for p in positions {
            map.insert(p.symbol.clone(), LivePosition { symbol: p.symbol, side: p.side, qty: p.qty });
        }
        Ok(VenueSnapshot { venue, fetched_at_ms: Utc::now().timestamp_millis(), positions: map })
    }

    /// Run one reconcile pass. `startup` is carried through to the returned
    /// outcome's logging context but does not change the detection logic —
    /// spec.md §4.5 runs the identical comparison at startup and on the
    /// periodic schedule.
    pub async fn run(&mut self, startup: bool, verdicts: &GateVerdicts) -> Result<ReconcileOutcome, ReconcilerError> {
        let mut outcome = ReconcileOutcome::default();

        let venue_a = self.venue_a.clone();
        let venue_b = self.venue_b.clone();
        let snap_a = match self.fetch_snapshot(&venue_a, Venue::VenueA).await {
            Ok(s) => s,
            Err(e) => {
                outcome.errors.push(format!("venue_a snapshot fetch failed: {e}"));
                return Ok(outcome);
            }
        };
        let snap_b = match self.fetch_snapshot(&venue_b, Venue::VenueB).await {
            Ok(s) => s,
            Err(e) => {
                outcome.errors.push(format!("venue_b snapshot fetch failed: {e}"));
                return Ok(outcome);
            }
        };

        if let Err(stale) = self.watermark.accept_all(&[snap_a.clone(), snap_b.clone()]) {
            outcome.errors.push(format!("{stale}"));
            return Ok(outcome);
        }

        let open_trades = self.trade_store.list_open().await?;
        let report = reconcile(&open_trades, &snap_a, &snap_b);

        for zombie in &report.zombies {
            match self.close_zombie(&zombie.trade_id, &zombie.symbol).await {
                Ok(()) => outcome.zombies_closed.push(zombie.trade_id.clone()),
                Err(e) => outcome.errors.push(format!("failed to close zombie {}: {e}", zombie.trade_id)),
            }
        }

        for ghost in &report.ghosts {
            match self.ghost_policy {
                GhostPolicy::Flatten | GhostPolicy::AdoptIfPaired => {
                    // Adoption requires a matching ghost on the *other* venue
                    // for the same symbol; a lone ghost can never be
                    // delta-neutral, so it is always flattened regardless of
                    // policy.
                    match self.flatten_ghost(ghost, verdicts).await {
                        Ok(()) => outcome.ghosts_closed.push(ghost.clone()),
                        Err(e) => outcome.errors.push(format!("failed to flatten ghost {} on {}: {e}", ghost.symbol, ghost.venue)),
                    }
                }
            }
        }

        for mismatch in &report.side_mismatches {
            tracing::warn!(
                trade_id = %mismatch.trade_id,
                venue = %mismatch.venue,
                symbol = %mismatch.symbol,
                trade_side = ?mismatch.trade_side,
                live_side = ?mismatch.live_side,
                "side mismatch between store and live position: not auto-corrected"
            );
            self.events
                .publish(DomainEvent::ReconcileDirty {
                    detail: format!("side mismatch on {} {}: trade={:?} live={:?}", mismatch.venue, mismatch.symbol, mismatch.trade_side, mismatch.live_side),
                    at: Utc::now(),
                })
                .await;
        }
        outcome.side_mismatches = report.side_mismatches.clone();

        let now = Instant::now();
        let broken_ids: std::collections::HashSet<&str> = report.broken_hedges.iter().map(|b| b.trade_id.as_str()).collect();
        for trade in &open_trades {
            if broken_ids.contains(trade.id.as_str()) {
                continue;
            }
            self.broken_hedge.observe(&trade.id, false, now);
        }
        for bh in &report.broken_hedges {
            if self.broken_hedge.observe(&bh.trade_id, true, now) {
                self.trip_broken_hedge(bh, verdicts, &mut outcome).await;
            }
        }

        let drift = reconcile_tick(&report);
        if drift.requires_halt_and_disarm() {
            self.arm_state = ArmState::disarm(DisarmReason::ReconcileDrift, Utc::now());
            self.events.publish(DomainEvent::ReconcileDirty { detail: format!("{} zombies, {} ghosts", report.zombies.len(), report.ghosts.len()), at: Utc::now() }).await;
        } else if outcome.is_clean() && report.broken_hedges.is_empty() {
            let cooldown_elapsed = self.broken_hedge_cooldown_until.map(|until| now >= until).unwrap_or(true);
            // The only path back to Armed: an explicit clean sweep with no
            // unresolved broken hedge, per spec.md §4.2's "resume only after
            // a clean all-balanced sweep" plus the cooldown floor.
            if self.arm_state.is_disarmed() && cooldown_elapsed {
                self.arm_state = ArmState::arm(Utc::now());
                self.broken_hedge_cooldown_until = None;
            }
            if cooldown_elapsed {
                self.events.publish(DomainEvent::ReconcileClean { at: Utc::now() }).await;
            }
        }

        tracing::info!(startup, zombies = outcome.zombies_closed.len(), ghosts = outcome.ghosts_closed.len(), broken_hedges = outcome.broken_hedges_flattened.len(), errors = outcome.errors.len(), "reconcile pass complete");
        Ok(outcome)
    }

    /// Fires once per trade on the edge where its presence/absence mismatch
    /// crosses from transient to confirmed: disarm, attempt to flatten the
    /// unmatched leg, and start the cooldown clock. Self-heal failures are
    /// logged but do not block the disarm — a failed flatten still needs the
    /// system paused, not silently retried while armed.
    async fn trip_broken_hedge(&mut self, bh: &BrokenHedgeTrade, verdicts: &GateVerdicts, outcome: &mut ReconcileOutcome) {
        tracing::error!(
            trade_id = %bh.trade_id,
            symbol = %bh.symbol,
            live_venue = %bh.live_venue,
            missing_venue = %bh.missing_venue,
            "broken hedge confirmed across consecutive sweeps"
        );
        self.arm_state = ArmState::disarm(DisarmReason::BrokenHedge { symbol: bh.symbol.clone() }, Utc::now());
        self.broken_hedge_cooldown_until = Some(Instant::now() + self.broken_hedge.cooldown());
        self.events
            .publish(DomainEvent::BrokenHedge {
                trade_id: bh.trade_id.clone(),
                symbol: bh.symbol.clone(),
                detail: format!("live position on {} with no matching position on {}", bh.live_venue, bh.missing_venue),
                at: Utc::now(),
            })
            .await;

        match self.flatten_broken_leg(bh, verdicts).await {
            Ok(()) => {
                outcome.broken_hedges_flattened.push(bh.trade_id.clone());
                // The trade is fully flat now (the unmatched leg just closed,
                // the other was already absent); close the record so next
                // sweep doesn't rediscover it as a zombie.
                if let Err(e) = self.close_broken_hedge_trade(&bh.trade_id, &bh.symbol).await {
                    outcome.errors.push(format!("flattened broken-hedge leg for {} but failed to close the trade record: {e}", bh.trade_id));
                }
            }
            Err(e) => outcome.errors.push(format!("failed to flatten broken-hedge leg for {} on {}: {e}", bh.trade_id, bh.live_venue)),
        }
    }

    async fn close_broken_hedge_trade(&self, trade_id: &str, symbol: &str) -> anyhow::Result<()> {
        let mut trade = self
            .trade_store
            .get(trade_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("broken-hedge trade {trade_id} vanished from store mid-sweep"))?;
        trade.status = fab_domain::TradeStatus::Closed;
        trade.close_reason = Some(CloseReason::BrokenHedge);
        trade.closed_at = Some(Utc::now());
        self.trade_store.upsert(&trade).await?;
        self.events
            .publish(DomainEvent::TradeClosed {
                trade_id: trade.id.clone(),
                symbol: symbol.to_string(),
                reason: CloseReason::BrokenHedge,
                realized_pnl_micros: trade.net_pnl().raw(),
                at: Utc::now(),
            })
            .await;
        Ok(())
    }

    async fn close_zombie(&self, trade_id: &str, symbol: &str) -> anyhow::Result<()> {
        let mut trade = self
            .trade_store
            .get(trade_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("zombie trade {trade_id} vanished from store mid-sweep"))?;
        trade.status = fab_domain::TradeStatus::Closed;
        trade.close_reason = Some(CloseReason::Zombie);
        trade.closed_at = Some(Utc::now());
        self.trade_store.upsert(&trade).await?;
        self.events
            .publish(DomainEvent::TradeClosed {
                trade_id: trade.id.clone(),
                symbol: symbol.to_string(),
                reason: CloseReason::Zombie,
                realized_pnl_micros: trade.net_pnl().raw(),
                at: Utc::now(),
            })
            .await;
        Ok(())
    }

    async fn flatten_ghost(&self, ghost: &GhostPosition, verdicts: &GateVerdicts) -> Result<(), fab_execution::GatewayError> {
        let adapter: &Arc<dyn VenueAdapter> = if ghost.venue == Venue::VenueA { &self.venue_a } else { &self.venue_b };
        let flatten_side = ghost.side.opposite();
        let req = PlaceOrderRequest {
            client_order_id: format!("reconcile-flatten-{}-{}", ghost.venue, ghost.symbol),
            symbol: ghost.symbol.clone(),
            side: flatten_side,
            order_type: OrderType::Market,
            tif: TimeInForce::Ioc,
            qty: ghost.qty,
            price: None,
            reduce_only: true,
            slippage_cap: None,
        };
        self.gateway.place_order(adapter.as_ref(), req, verdicts).await?;
        Ok(())
    }

    /// Self-heal for a confirmed broken hedge: flatten the one leg that is
    /// still live, mirroring [`Reconciler::flatten_ghost`] — both are a
    /// reduce-only market IOC against the venue holding the unwanted side.
    async fn flatten_broken_leg(&self, bh: &BrokenHedgeTrade, verdicts: &GateVerdicts) -> Result<(), fab_execution::GatewayError> {
        let adapter: &Arc<dyn VenueAdapter> = if bh.live_venue == Venue::VenueA { &self.venue_a } else { &self.venue_b };
        let req = PlaceOrderRequest {
            client_order_id: format!("reconcile-broken-hedge-{}-{}", bh.live_venue, bh.symbol),
            symbol: bh.symbol.clone(),
            side: bh.live_side.opposite(),
            order_type: OrderType::Market,
            tif: TimeInForce::Ioc,
            qty: bh.live_qty,
            price: None,
            reduce_only: true,
            slippage_cap: None,
        };
        self.gateway.place_order(adapter.as_ref(), req, verdicts).await?;
        Ok(())
    }
}
