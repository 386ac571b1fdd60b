//! Execution Engine: converts a single `Opportunity` into an open, delta-
//! neutral `Trade` across the two venues, or fails it cleanly.
//!
//! Generalizes the teacher's target-position-to-intent converter
//! (`targets_to_order_intents`, a pure deterministic function with no venue
//! I/O) into the stateful open-pair algorithm this core actually needs: a
//! maker-first leg on the rebate venue, a taker hedge on the other, and a
//! rollback path when the hedge cannot be completed. Every external call
//! still flows through `ExecutionGateway`, matching the teacher's "single
//! choke-point" invariant; what changed is that the engine now owns the
//! multi-step state needed to get there.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use fab_domain::{
    AttemptStage, AttemptStatus, ExecutionAttempt, ExecutionState, Micros, Opportunity, Order,
    OrderStatus, OrderType, Side, TimeInForce, Trade, TradeLeg, TradeStatus, Venue,
};
use fab_domain::{DomainEvent, EventBus, TradeStore};
use fab_marketdata::{FillCache, MarketDataService, SharedMarketDataService};
use fab_venue::{PlaceOrderRequest, VenueAdapter};

use crate::gateway::{trade_leg_client_order_id, ExecutionGateway, GateVerdicts};
use crate::types::ExecutionError;

#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    /// How long to wait for a resting maker fill before repricing.
    pub leg1_fill_wait: Duration,
    /// Maximum number of maker reprices before giving up (or escalating).
    pub leg1_max_reprices: u32,
    /// If true, the final leg1 attempt after exhausting reprices is a taker
    /// (market) order instead of aborting unfilled.
    pub leg1_taker_escalation: bool,
    /// Slippage-cap multipliers tried in order for the leg2 taker hedge; the
    /// last entry is the "salvage hedge" — submitted with no cap at all.
    pub leg2_widen_steps: Vec<f64>,
    pub leg2_fill_wait: Duration,
    /// Spread tolerance (relative) allowed to move between opportunity
    /// evaluation and leg1 submission before the attempt is aborted.
    pub spread_tolerance_pct: f64,
    /// Both venues' aggregated depth at the entry/hedge levels must be at
    /// least `qty * liquidity_safety_factor` for the preflight to pass.
    pub liquidity_safety_factor: f64,
    /// A quantized size below `max(min_qty_a, min_qty_b)` is bumped up to
    /// the minimum instead of rejected, provided the bump ratio is no more
    /// than this multiple.
    pub max_min_qty_bump_multiple: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            leg1_fill_wait: Duration::from_secs(8),
            leg1_max_reprices: 3,
            leg1_taker_escalation: true,
            leg2_widen_steps: vec![1.0, 1.5, 2.5],
            leg2_fill_wait: Duration::from_secs(5),
            spread_tolerance_pct: 0.15,
            liquidity_safety_factor: 3.0,
            max_min_qty_bump_multiple: 1.2,
        }
    }
}

pub struct ExecutionEngine {
    gateway: ExecutionGateway,
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    fill_cache_a: Arc<FillCache>,
    fill_cache_b: Arc<FillCache>,
    market_data: SharedMarketDataService,
    trade_store: Arc<dyn TradeStore>,
    events: Arc<dyn EventBus>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        fill_cache_a: Arc<FillCache>,
        fill_cache_b: Arc<FillCache>,
        market_data: Arc<MarketDataService>,
        trade_store: Arc<dyn TradeStore>,
        events: Arc<dyn EventBus>,
        config: ExecutionConfig,
    ) -> Self {
        ExecutionEngine {
            gateway: ExecutionGateway::new(),
            venue_a,
            venue_b,
            fill_cache_a,
            fill_cache_b,
            market_data,
            trade_store,
            events,
            config,
        }
    }

    fn adapter_for(&self, venue: Venue) -> &Arc<dyn VenueAdapter> {
        match venue {
            Venue::VenueA => &self.venue_a,
            Venue::VenueB => &self.venue_b,
        }
    }

    fn fill_cache_for(&self, venue: Venue) -> &Arc<FillCache> {
        match venue {
            Venue::VenueA => &self.fill_cache_a,
            Venue::VenueB => &self.fill_cache_b,
        }
    }

    fn attempt(
        trade_id: &str,
        symbol: &str,
        stage: AttemptStage,
        status: AttemptStatus,
        reason: Option<String>,
    ) -> ExecutionAttempt {
        let now = chrono::Utc::now();
        ExecutionAttempt {
            attempt_id: Uuid::new_v4().to_string(),
            trade_id: trade_id.to_string(),
            symbol: symbol.to_string(),
            stage,
            status,
            reason,
            started_at: now,
            finished_at: now,
            spread_pct: None,
        }
    }

    /// Open a Trade for the given opportunity. Callers are responsible for
    /// serializing attempts on the same symbol via `fab_domain::SymbolLockTable`
    /// before calling this.
    pub async fn execute(&self, opp: Opportunity, verdicts: GateVerdicts) -> Result<Trade, ExecutionError> {
        if !opp.is_valid() {
            return Err(ExecutionError::InvalidOpportunity);
        }

        let trade_id = Uuid::new_v4().to_string();

        let qty = match self.preflight(&opp).await {
            Ok(qty) => qty,
            Err(e) => {
                let stage = match e {
                    ExecutionError::InsufficientHedgeDepth => AttemptStage::LiquidityCheck,
                    _ => AttemptStage::Preflight,
                };
                tracing::debug!(
                    attempt = ?Self::attempt(&trade_id, &opp.symbol, stage, AttemptStatus::Rejected, Some(e.to_string())),
                    "preflight rejected attempt"
                );
                return Err(e);
            }
        };

        let mut trade = Trade {
            id: trade_id.clone(),
            symbol: opp.symbol.clone(),
            status: TradeStatus::Pending,
            execution_state: ExecutionState::Pending,
            leg1: TradeLeg::new(opp.long_venue, Side::Long, qty),
            leg2: TradeLeg::new(opp.short_venue, Side::Short, qty),
            target_qty: qty,
            target_notional: opp.suggested_notional,
            entry_apy: opp.apy,
            created_at: chrono::Utc::now(),
            opened_at: None,
            closed_at: None,
            realized_pnl: Micros::ZERO,
            funding_collected: Micros::ZERO,
            close_reason: None,
        };
        self.trade_store.upsert(&trade).await.ok();
        tracing::debug!(attempt = ?Self::attempt(&trade_id, &opp.symbol, AttemptStage::Preflight, AttemptStatus::Ok, None), "preflight passed");

        if let Err(e) = self.check_spread(&opp) {
            tracing::debug!(
                attempt = ?Self::attempt(&trade_id, &opp.symbol, AttemptStage::SpreadCheck, AttemptStatus::Rejected, Some(e.to_string())),
                "spread check rejected attempt"
            );
            return Err(e);
        }

        trade.status = TradeStatus::Opening;
        self.trade_store.upsert(&trade).await.ok();

        trade.execution_state = ExecutionState::Leg1Submitted;
        let leg1_order = match self.run_leg1(&trade, &opp, qty, &verdicts).await {
            Ok(order) => order,
            Err(e) => {
                tracing::debug!(
                    attempt = ?Self::attempt(&trade_id, &opp.symbol, AttemptStage::Leg1, AttemptStatus::Failed, Some(e.to_string())),
                    "leg1 failed"
                );
                trade.status = TradeStatus::Rejected;
                self.trade_store.upsert(&trade).await.ok();
                return Err(e);
            }
        };
        trade.leg1.order_id = Some(leg1_order.id.clone());
        trade.leg1.client_order_id = Some(leg1_order.client_id.clone());
        trade.leg1.filled_qty = leg1_order.filled_qty;
        trade.leg1.entry_price = leg1_order.avg_fill_price;
        trade.leg1.fees = leg1_order.fee;
        trade.execution_state = ExecutionState::Leg1Filled;
        // The assimilated fill may be less than the quantized target if
        // reprices never fully filled; leg2 and the trade's own target
        // shrink to match so the pair stays delta-neutral.
        trade.target_qty = leg1_order.filled_qty;
        if let Some(price) = leg1_order.avg_fill_price {
            if let Some(notional) = price.checked_mul_qty(leg1_order.filled_qty) {
                trade.target_notional = notional;
            }
        }
        self.trade_store.upsert(&trade).await.ok();

        if !self.hedge_depth_ok(&opp, leg1_order.filled_qty) {
            return self.rollback(trade, leg1_order, "insufficient hedge depth at leg2 preflight").await;
        }

        trade.execution_state = ExecutionState::Leg2Submitted;
        match self.run_leg2(&trade, &opp, leg1_order.filled_qty, &verdicts).await {
            Ok(leg2_order) => {
                trade.leg2.order_id = Some(leg2_order.id.clone());
                trade.leg2.client_order_id = Some(leg2_order.client_id.clone());
                trade.leg2.filled_qty = leg2_order.filled_qty;
                trade.leg2.entry_price = leg2_order.avg_fill_price;
                trade.leg2.fees = leg2_order.fee;
                trade.execution_state = ExecutionState::Complete;
                trade.status = TradeStatus::Open;
                trade.opened_at = Some(chrono::Utc::now());
                self.trade_store.upsert(&trade).await.ok();
                tracing::debug!(
                    attempt = ?Self::attempt(&trade.id, &trade.symbol, AttemptStage::Finalize, AttemptStatus::Ok, None),
                    "trade opened"
                );
                self.events.publish(DomainEvent::trade_opened(&trade)).await;
                Ok(trade)
            }
            Err(_) => self.rollback(trade, leg1_order, "leg2 hedge exhausted all widening steps").await,
        }
    }

    fn check_spread(&self, opp: &Opportunity) -> Result<(), ExecutionError> {
        let snap = self.market_data.snapshot(&opp.symbol);
        if !snap.is_internally_consistent() {
            return Err(ExecutionError::SpreadMoved);
        }
        let (long_ask, short_bid) = match (opp.long_venue, opp.short_venue) {
            (Venue::VenueA, Venue::VenueB) => (snap.venue_a_ask, snap.venue_b_bid),
            (Venue::VenueB, Venue::VenueA) => (snap.venue_b_ask, snap.venue_a_bid),
            _ => return Err(ExecutionError::InvalidOpportunity),
        };
        let (Some(ask), Some(bid)) = (long_ask, short_bid) else {
            return Err(ExecutionError::SpreadMoved);
        };
        let current_spread = Micros::relative_diff(bid.price, ask.price);
        let drift = (current_spread - opp.spread_pct).abs();
        if opp.spread_pct > 0.0 && drift / opp.spread_pct > self.config.spread_tolerance_pct {
            return Err(ExecutionError::SpreadMoved);
        }
        Ok(())
    }

    fn hedge_depth_ok(&self, opp: &Opportunity, qty: i64) -> bool {
        let snap = self.market_data.snapshot(&opp.symbol);
        let hedge_side = match opp.short_venue {
            Venue::VenueA => snap.venue_a_bid,
            Venue::VenueB => snap.venue_b_bid,
        };
        hedge_side.map(|level| level.qty >= qty).unwrap_or(false)
    }

    /// Balance, liquidity-safety-factor, and size-quantization gate run
    /// before either leg is touched. Returns the quantized size to submit,
    /// which may be smaller than `opp.suggested_qty` (rounded to the
    /// coarser of the two venues' step sizes) or bumped up to their shared
    /// minimum when that bump is within `max_min_qty_bump_multiple`.
    async fn preflight(&self, opp: &Opportunity) -> Result<i64, ExecutionError> {
        let long_adapter = self.adapter_for(opp.long_venue).clone();
        let short_adapter = self.adapter_for(opp.short_venue).clone();
        let (long_meta, short_meta) =
            tokio::join!(long_adapter.market_metadata(&opp.symbol), short_adapter.market_metadata(&opp.symbol));
        let long_meta = long_meta?;
        let short_meta = short_meta?;

        let step = long_meta.step_size.max(short_meta.step_size).max(1);
        let min_qty = long_meta.min_qty.max(short_meta.min_qty);

        let mut qty = (opp.suggested_qty / step) * step;
        if qty < min_qty {
            let bump = if qty <= 0 { f64::INFINITY } else { min_qty as f64 / qty as f64 };
            if bump > self.config.max_min_qty_bump_multiple {
                return Err(ExecutionError::QtyBelowMinimum);
            }
            qty = min_qty;
        }

        if !self.preflight_liquidity_ok(opp, qty) {
            return Err(ExecutionError::InsufficientHedgeDepth);
        }

        let (long_balance, short_balance) =
            tokio::join!(long_adapter.get_available_balance(), short_adapter.get_available_balance());
        let long_balance = long_balance?;
        let short_balance = short_balance?;

        let scale = qty as f64 / opp.suggested_qty.max(1) as f64;
        let required_notional = Micros::new((opp.suggested_notional.raw() as f64 * scale).round() as i64);
        let long_margin = Micros::new((required_notional.raw() as f64 / long_meta.max_leverage.max(1) as f64).round() as i64);
        let short_margin = Micros::new((required_notional.raw() as f64 / short_meta.max_leverage.max(1) as f64).round() as i64);
        if long_balance < long_margin || short_balance < short_margin {
            return Err(ExecutionError::InsufficientBalance);
        }

        Ok(qty)
    }

    /// Both venues' depth at the entry/hedge book levels must cover `qty`
    /// with `liquidity_safety_factor` headroom, ahead of either leg's
    /// order actually touching the book.
    fn preflight_liquidity_ok(&self, opp: &Opportunity, qty: i64) -> bool {
        let long_level = match opp.long_venue {
            Venue::VenueA => opp.snapshot.venue_a_ask,
            Venue::VenueB => opp.snapshot.venue_b_ask,
        };
        let short_level = match opp.short_venue {
            Venue::VenueA => opp.snapshot.venue_a_bid,
            Venue::VenueB => opp.snapshot.venue_b_bid,
        };
        let required = (qty as f64 * self.config.liquidity_safety_factor).ceil() as i64;
        long_level.map(|l| l.qty >= required).unwrap_or(false) && short_level.map(|l| l.qty >= required).unwrap_or(false)
    }

    /// Folds a pre-attempt position snapshot into a fill report so a fill
    /// realized externally between reprice attempts isn't counted twice —
    /// once via the snapshot, once via the next attempt's own fill report.
    fn assimilate_fill(mut order: Order, pre_attempt_qty: i64) -> Order {
        order.filled_qty = order.filled_qty.max(pre_attempt_qty);
        order
    }

    async fn live_position_qty(&self, venue: Venue, symbol: &str) -> i64 {
        self.adapter_for(venue).get_position(symbol).await.ok().flatten().map(|p| p.qty).unwrap_or(0)
    }

    async fn run_leg1(
        &self,
        trade: &Trade,
        opp: &Opportunity,
        qty: i64,
        verdicts: &GateVerdicts,
    ) -> Result<Order, ExecutionError> {
        let adapter = self.adapter_for(opp.long_venue).clone();
        let fill_cache = self.fill_cache_for(opp.long_venue).clone();
        let client_order_id = trade_leg_client_order_id(&trade.id, 1);

        let entry_price = match opp.long_venue {
            Venue::VenueA => opp.snapshot.venue_a_bid,
            Venue::VenueB => opp.snapshot.venue_b_bid,
        }
        .map(|l| l.price)
        .unwrap_or(Micros::ZERO);

        let mut price = entry_price;
        let mut reprices_exhausted = false;
        for attempt_idx in 0..=self.config.leg1_max_reprices {
            let pre_attempt_qty = self.live_position_qty(opp.long_venue, &opp.symbol).await;
            let watcher = fill_cache.register_watcher(opp.long_venue, &client_order_id);
            let req = PlaceOrderRequest {
                client_order_id: client_order_id.clone(),
                symbol: opp.symbol.clone(),
                side: Side::Long,
                order_type: OrderType::Limit,
                tif: TimeInForce::PostOnly,
                qty,
                price: Some(price),
                reduce_only: false,
                slippage_cap: None,
            };
            let order = self.gateway.place_order(adapter.as_ref(), req, verdicts).await?;

            match tokio::time::timeout(self.config.leg1_fill_wait, watcher).await {
                Ok(Ok(filled)) if filled.status == OrderStatus::Filled => {
                    return Ok(Self::assimilate_fill(filled, pre_attempt_qty));
                }
                _ => {
                    self.gateway.cancel_order(adapter.as_ref(), &opp.symbol, &order.id, verdicts).await.ok();
                    if attempt_idx == self.config.leg1_max_reprices {
                        reprices_exhausted = true;
                        break;
                    }
                    price = self.reprice_toward_mid(opp, price);
                }
            }
        }

        if reprices_exhausted && self.config.leg1_taker_escalation {
            let pre_attempt_qty = self.live_position_qty(opp.long_venue, &opp.symbol).await;
            let market_req = PlaceOrderRequest {
                client_order_id: format!("{client_order_id}-mkt"),
                symbol: opp.symbol.clone(),
                side: Side::Long,
                order_type: OrderType::Market,
                tif: TimeInForce::Ioc,
                qty,
                price: None,
                reduce_only: false,
                slippage_cap: None,
            };
            let filled = self.gateway.place_order(adapter.as_ref(), market_req, verdicts).await?;
            return Ok(Self::assimilate_fill(filled, pre_attempt_qty));
        }
        Err(ExecutionError::Leg1Timeout)
    }

    fn reprice_toward_mid(&self, opp: &Opportunity, current: Micros) -> Micros {
        let opposite = match opp.long_venue {
            Venue::VenueA => opp.snapshot.venue_a_ask,
            Venue::VenueB => opp.snapshot.venue_b_ask,
        };
        match opposite {
            Some(ask) if ask.price > current => {
                let step = (ask.price - current).raw() / 4;
                current + Micros::new(step.max(1))
            }
            _ => current,
        }
    }

    async fn run_leg2(
        &self,
        trade: &Trade,
        opp: &Opportunity,
        qty: i64,
        verdicts: &GateVerdicts,
    ) -> Result<Order, ExecutionError> {
        let adapter = self.adapter_for(opp.short_venue).clone();
        let fill_cache = self.fill_cache_for(opp.short_venue).clone();
        let client_order_id = trade_leg_client_order_id(&trade.id, 2);

        let base_price = match opp.short_venue {
            Venue::VenueA => opp.snapshot.venue_a_bid,
            Venue::VenueB => opp.snapshot.venue_b_bid,
        }
        .map(|l| l.price)
        .unwrap_or(Micros::ZERO);

        for (idx, widen) in self.config.leg2_widen_steps.iter().enumerate() {
            let is_salvage = idx == self.config.leg2_widen_steps.len() - 1;
            let cap = if is_salvage {
                None
            } else {
                Some(Micros::new((base_price.raw() as f64 * (widen - 1.0)).abs() as i64))
            };
            let watcher = fill_cache.register_watcher(opp.short_venue, &client_order_id);
            let req = PlaceOrderRequest {
                client_order_id: client_order_id.clone(),
                symbol: opp.symbol.clone(),
                side: Side::Short,
                order_type: OrderType::Market,
                tif: TimeInForce::Ioc,
                qty,
                price: None,
                reduce_only: false,
                slippage_cap: cap,
            };
            match self.gateway.place_order(adapter.as_ref(), req, verdicts).await {
                Ok(order) => match tokio::time::timeout(self.config.leg2_fill_wait, watcher).await {
                    Ok(Ok(filled)) if filled.status == OrderStatus::Filled => return Ok(filled),
                    _ if order.status == OrderStatus::Filled => return Ok(order),
                    _ => continue,
                },
                Err(_) => continue,
            }
        }
        Err(ExecutionError::RolledBack)
    }

    async fn rollback(
        &self,
        mut trade: Trade,
        leg1_order: Order,
        reason: &str,
    ) -> Result<Trade, ExecutionError> {
        trade.execution_state = ExecutionState::RollbackNeeded;
        self.trade_store.upsert(&trade).await.ok();
        tracing::debug!(
            attempt = ?Self::attempt(&trade.id, &trade.symbol, AttemptStage::Rollback, AttemptStatus::Aborted, Some(reason.to_string())),
            "rollback started"
        );

        // Flattening leg1 is risk-reducing, so it goes straight to the
        // adapter rather than back through the gateway: a disarm/halt that
        // fires mid-attempt must not be able to trap an unhedged position.
        let adapter = self.adapter_for(leg1_order.venue).clone();
        let flatten_req = PlaceOrderRequest {
            client_order_id: format!("{}-rollback", trade.id),
            symbol: trade.symbol.clone(),
            side: Side::Short,
            order_type: OrderType::Market,
            tif: TimeInForce::Ioc,
            qty: leg1_order.filled_qty,
            price: None,
            reduce_only: true,
            slippage_cap: None,
        };
        let flattened = adapter.place_order(flatten_req).await;

        match flattened {
            Ok(_) => {
                trade.execution_state = ExecutionState::RollbackDone;
                trade.status = TradeStatus::Rejected;
                self.trade_store.upsert(&trade).await.ok();
                tracing::warn!(trade_id = %trade.id, reason, "leg2 failed, leg1 rolled back cleanly");
                Err(ExecutionError::RolledBack)
            }
            Err(e) => {
                trade.execution_state = ExecutionState::Aborted;
                trade.status = TradeStatus::Failed;
                self.trade_store.upsert(&trade).await.ok();
                self.events
                    .publish(DomainEvent::BrokenHedge {
                        trade_id: trade.id.clone(),
                        symbol: trade.symbol.clone(),
                        detail: format!("{reason}; rollback flatten also failed: {e}"),
                        at: chrono::Utc::now(),
                    })
                    .await;
                Err(ExecutionError::BrokenHedge)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fab_domain::{BookLevel, OrderbookSnapshot};

    fn sample_snapshot() -> OrderbookSnapshot {
        let mut snap = OrderbookSnapshot::empty("BTC");
        snap.venue_a_bid = Some(BookLevel { price: Micros::new(100_000_000), qty: 100 });
        snap.venue_a_ask = Some(BookLevel { price: Micros::new(100_100_000), qty: 100 });
        snap.venue_b_bid = Some(BookLevel { price: Micros::new(100_300_000), qty: 100 });
        snap.venue_b_ask = Some(BookLevel { price: Micros::new(100_400_000), qty: 100 });
        snap
    }

    fn sample_opportunity() -> Opportunity {
        Opportunity {
            symbol: "BTC".into(),
            apy: 0.3,
            spread_pct: 0.002,
            suggested_qty: 10,
            suggested_notional: Micros::new(1_000_000_000),
            expected_value_usd: Micros::new(5_000_000),
            long_venue: Venue::VenueA,
            short_venue: Venue::VenueB,
            snapshot: sample_snapshot(),
        }
    }

    #[test]
    fn invalid_opportunity_is_rejected_by_is_valid() {
        let mut opp = sample_opportunity();
        opp.suggested_qty = 0;
        assert!(!opp.is_valid());
    }

    #[test]
    fn attempt_builder_stamps_fields() {
        let a = ExecutionEngine::attempt("t1", "BTC", AttemptStage::Preflight, AttemptStatus::Ok, None);
        assert_eq!(a.trade_id, "t1");
        assert_eq!(a.stage, AttemptStage::Preflight);
    }
}
