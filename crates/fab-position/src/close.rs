//! Close strategies: coordinated dual-leg close, sequential fallback, and
//! drift rebalance. Grounded on the teacher's coordinated-close module
//! (parallel maker orders on both legs, short timeout, escalate whatever
//! didn't fill to IOC on both legs at once so there is never a one-sided
//! unhedged window) and its rebalance module (reduce only the larger leg,
//! maker-first with an IOC fallback).
//!
//! Every order this module places goes through [`ExecutionGateway`] exactly
//! like the open side, so a disarm/halt mid-close is still honored — unlike
//! `ExecutionEngine::rollback`, closing an already-complete trade is not a
//! risk-reducing emergency that needs to bypass the gate.

use std::sync::Arc;
use std::time::Duration;

use fab_domain::ports::{EventBus, TradeStore};
use fab_domain::{CloseReason, DomainEvent, Micros, Order, OrderStatus, OrderType, Side, TimeInForce, Trade, Venue};
use fab_execution::{trade_leg_client_order_id, ExecutionGateway, GateVerdicts};
use fab_marketdata::{FillCache, SharedMarketDataService};
use fab_venue::{PlaceOrderRequest, VenueAdapter};

use crate::config::PositionConfig;

#[derive(Debug, thiserror::Error)]
pub enum CloseError {
    #[error("gate refused the close: {0}")]
    Gate(#[from] fab_execution::GateRefusal),
    #[error(transparent)]
    Gateway(#[from] fab_execution::GatewayError),
    #[error("venue error during close: {0}")]
    Venue(#[from] fab_venue::VenueError),
    #[error("close completed but verification found residual qty on {venue}")]
    VerificationFailed { venue: Venue },
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub struct PositionCloser {
    gateway: ExecutionGateway,
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    fill_cache_a: Arc<FillCache>,
    fill_cache_b: Arc<FillCache>,
    market_data: SharedMarketDataService,
    trade_store: Arc<dyn TradeStore>,
    events: Arc<dyn EventBus>,
    config: PositionConfig,
}

impl PositionCloser {
    pub fn new(
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        fill_cache_a: Arc<FillCache>,
        fill_cache_b: Arc<FillCache>,
        market_data: SharedMarketDataService,
        trade_store: Arc<dyn TradeStore>,
        events: Arc<dyn EventBus>,
        config: PositionConfig,
    ) -> Self {
        PositionCloser {
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

    fn adapter_for(&self, venue: Venue) -> &dyn VenueAdapter {
        match venue {
            Venue::VenueA => self.venue_a.as_ref(),
            Venue::VenueB => self.venue_b.as_ref(),
        }
    }

    fn fill_cache_for(&self, venue: Venue) -> &FillCache {
        match venue {
            Venue::VenueA => &self.fill_cache_a,
            Venue::VenueB => &self.fill_cache_b,
        }
    }

    fn leg_mut(trade: &mut Trade, venue: Venue) -> &mut fab_domain::TradeLeg {
        if trade.leg1.venue == venue {
            &mut trade.leg1
        } else {
            &mut trade.leg2
        }
    }

    fn maker_price(&self, trade: &Trade, venue: Venue, close_side: Side) -> Option<Micros> {
        let snap = self.market_data.snapshot(&trade.symbol);
        let (bid, ask) = match venue {
            Venue::VenueA => (snap.venue_a_bid, snap.venue_a_ask),
            Venue::VenueB => (snap.venue_b_bid, snap.venue_b_ask),
        };
        match close_side {
            Side::Short => bid.map(|l| l.price), // selling to close a long leg: join the bid
            Side::Long => ask.map(|l| l.price),  // buying to close a short leg: join the ask
        }
    }

    fn taker_price(&self, trade: &Trade, venue: Venue, close_side: Side) -> Option<Micros> {
        let snap = self.market_data.snapshot(&trade.symbol);
        let (bid, ask) = match venue {
            Venue::VenueA => (snap.venue_a_bid, snap.venue_a_ask),
            Venue::VenueB => (snap.venue_b_bid, snap.venue_b_ask),
        };
        match close_side {
            Side::Short => bid.map(|l| l.price), // crossing the spread to sell: hit the bid
            Side::Long => ask.map(|l| l.price),  // crossing the spread to buy: lift the ask
        }
    }

    async fn place_close_order(
        &self,
        trade: &Trade,
        venue: Venue,
        side: Side,
        qty: i64,
        price: Micros,
        tif: TimeInForce,
        verdicts: &GateVerdicts,
    ) -> Result<Order, CloseError> {
        let leg_index: u8 = if trade.leg1.venue == venue { 1 } else { 2 };
        let client_order_id = trade_leg_client_order_id(&format!("{}-close", trade.id), leg_index);
        let watcher = self.fill_cache_for(venue).register_watcher(venue, &client_order_id);
        let req = PlaceOrderRequest {
            client_order_id,
            symbol: trade.symbol.clone(),
            side,
            order_type: OrderType::Limit,
            tif,
            qty,
            price: Some(price),
            reduce_only: true,
            slippage_cap: None,
        };
        let order = self.gateway.place_order(self.adapter_for(venue), req, verdicts).await?;
        let wait = if tif == TimeInForce::PostOnly {
            self.config.maker_order_timeout
        } else {
            Duration::from_secs(5)
        };
        match tokio::time::timeout(wait, watcher).await {
            Ok(Ok(filled)) if filled.status == OrderStatus::Filled => Ok(filled),
            Ok(Ok(other)) => Ok(other),
            _ => {
                if tif == TimeInForce::PostOnly {
                    let _ = self.gateway.cancel_order(self.adapter_for(venue), &trade.symbol, &order.id, verdicts).await;
                }
                Ok(order)
            }
        }
    }

    fn apply_fill(trade: &mut Trade, venue: Venue, filled: &Order) {
        let leg = Self::leg_mut(trade, venue);
        leg.filled_qty = (leg.filled_qty - filled.filled_qty).max(0);
        leg.exit_price = Some(filled.avg_fill_price.unwrap_or(leg.exit_price.unwrap_or(Micros::ZERO)));
        leg.fees += filled.fee;
    }

    /// Submit POST_ONLY maker orders on both legs at once, wait a short
    /// timeout, then escalate whatever is left unfilled to IOC on both legs
    /// simultaneously — the teacher's strategy for keeping the unhedged
    /// window as close to zero as coordination allows.
    pub async fn close_both_legs_coordinated(
        &self,
        mut trade: Trade,
        verdicts: &GateVerdicts,
    ) -> Result<Trade, CloseError> {
        let leg1_qty = trade.leg1.filled_qty;
        let leg2_qty = trade.leg2.filled_qty;
        if leg1_qty <= 0 && leg2_qty <= 0 {
            return Ok(trade);
        }

        let leg1_side = trade.leg1.side.opposite();
        let leg2_side = trade.leg2.side.opposite();
        let leg1_price = self.maker_price(&trade, trade.leg1.venue, leg1_side);
        let leg2_price = self.maker_price(&trade, trade.leg2.venue, leg2_side);

        let mut pending = Vec::new();
        if leg1_qty > 0 {
            if let Some(price) = leg1_price {
                pending.push((trade.leg1.venue, leg1_side, leg1_qty, price));
            }
        }
        if leg2_qty > 0 {
            if let Some(price) = leg2_price {
                pending.push((trade.leg2.venue, leg2_side, leg2_qty, price));
            }
        }

        let maker_results: Vec<_> = futures_util::future::join_all(
            pending
                .iter()
                .map(|(venue, side, qty, price)| self.place_close_order(&trade, *venue, *side, *qty, *price, TimeInForce::PostOnly, verdicts)),
        )
        .await;

        let mut still_open = Vec::new();
        for ((venue, side, qty, _), result) in pending.iter().zip(maker_results) {
            match result {
                Ok(order) if order.status == OrderStatus::Filled => {
                    Self::apply_fill(&mut trade, *venue, &order);
                }
                Ok(_) => still_open.push((*venue, *side, *qty)),
                Err(e) => {
                    tracing::warn!(venue = ?venue, error = %e, "maker close order failed, will escalate to IOC");
                    still_open.push((*venue, *side, *qty));
                }
            }
        }

        if still_open.is_empty() {
            self.trade_store.upsert(&trade).await?;
            return Ok(trade);
        }

        let ioc_results: Vec<_> = futures_util::future::join_all(still_open.iter().map(|(venue, side, qty)| async {
            let price = self.taker_price(&trade, *venue, *side);
            match price {
                Some(price) => self.place_close_order(&trade, *venue, *side, *qty, price, TimeInForce::Ioc, verdicts).await,
                None => Err(CloseError::Venue(fab_venue::VenueError::Transient("no book to cross for IOC close".into()))),
            }
        }))
        .await;

        for ((venue, _, _), result) in still_open.iter().zip(ioc_results) {
            match result {
                Ok(order) => Self::apply_fill(&mut trade, *venue, &order),
                Err(e) => tracing::warn!(venue = ?venue, error = %e, "IOC close escalation failed"),
            }
        }

        self.trade_store.upsert(&trade).await?;
        Ok(trade)
    }

    /// Per-leg maker-then-IOC close, one venue at a time. Used as the
    /// fallback when coordinated close is unavailable and for the
    /// early-take-profit fast path, where a brief unhedged window matters
    /// less than minimizing slippage on a trade that is already profitable.
    pub async fn close_leg_smart(&self, trade: &mut Trade, venue: Venue, verdicts: &GateVerdicts) -> Result<(), CloseError> {
        let leg = if trade.leg1.venue == venue { &trade.leg1 } else { &trade.leg2 };
        let qty = leg.filled_qty;
        if qty <= 0 {
            return Ok(());
        }
        let side = leg.side.opposite();

        for attempt in 0..self.config.maker_order_max_retries {
            let remaining = if trade.leg1.venue == venue { trade.leg1.filled_qty } else { trade.leg2.filled_qty };
            if remaining <= self.config.dust_qty {
                break;
            }
            let Some(price) = self.maker_price(trade, venue, side) else { break };
            let order = self.place_close_order(trade, venue, side, remaining, price, TimeInForce::PostOnly, verdicts).await?;
            Self::apply_fill(trade, venue, &order);
            tracing::debug!(venue = ?venue, attempt, remaining_after = ?order.filled_qty, "smart close maker attempt");
        }

        for _ in 0..self.config.hedge_ioc_max_attempts {
            let remaining = if trade.leg1.venue == venue { trade.leg1.filled_qty } else { trade.leg2.filled_qty };
            if remaining <= self.config.dust_qty {
                break;
            }
            let Some(price) = self.taker_price(trade, venue, side) else { break };
            let order = self.place_close_order(trade, venue, side, remaining, price, TimeInForce::Ioc, verdicts).await?;
            Self::apply_fill(trade, venue, &order);
        }
        Ok(())
    }

    pub async fn close_both_legs_sequential(&self, mut trade: Trade, verdicts: &GateVerdicts) -> Result<Trade, CloseError> {
        let leg1_venue = trade.leg1.venue;
        self.close_leg_smart(&mut trade, leg1_venue, verdicts).await?;
        self.trade_store.upsert(&trade).await?;
        let leg2_venue = trade.leg2.venue;
        self.close_leg_smart(&mut trade, leg2_venue, verdicts).await?;
        self.trade_store.upsert(&trade).await?;
        Ok(trade)
    }

    /// Reduce only the larger leg back toward delta neutrality. Does not
    /// touch the smaller leg at all — rebalance corrects drift, it does not
    /// close the position.
    pub async fn rebalance(&self, mut trade: Trade, reduce_leg: Side, reduce_qty: i64, verdicts: &GateVerdicts) -> Result<Trade, CloseError> {
        let venue = if trade.leg1.side == reduce_leg { trade.leg1.venue } else { trade.leg2.venue };
        let close_side = reduce_leg.opposite();
        let qty_before = if trade.leg1.venue == venue { trade.leg1.filled_qty } else { trade.leg2.filled_qty };

        if let Some(price) = self.maker_price(&trade, venue, close_side) {
            let order = self.place_close_order(&trade, venue, close_side, reduce_qty, price, TimeInForce::PostOnly, verdicts).await?;
            Self::apply_fill(&mut trade, venue, &order);
        }

        let qty_after_maker = if trade.leg1.venue == venue { trade.leg1.filled_qty } else { trade.leg2.filled_qty };
        let filled_so_far = (qty_before - qty_after_maker).max(0);
        let residual = (reduce_qty - filled_so_far).max(0);
        if residual > self.config.dust_qty {
            if let Some(price) = self.taker_price(&trade, venue, close_side) {
                let order = self.place_close_order(&trade, venue, close_side, residual, price, TimeInForce::Ioc, verdicts).await?;
                Self::apply_fill(&mut trade, venue, &order);
            }
        }

        self.trade_store.upsert(&trade).await?;
        Ok(trade)
    }

    /// Close verification with soft-close retries: a `dust_qty`-tolerant
    /// residual check on both legs, re-attempting the smart close up to
    /// `soft_close_attempts` times before giving up and surfacing
    /// [`CloseError::VerificationFailed`] for the caller to treat as a
    /// broken-hedge signal.
    pub async fn verify_and_finalize(&self, mut trade: Trade, reason: CloseReason, verdicts: &GateVerdicts) -> Result<Trade, CloseError> {
        for _ in 0..self.config.soft_close_attempts {
            if trade.leg1.filled_qty <= self.config.dust_qty && trade.leg2.filled_qty <= self.config.dust_qty {
                break;
            }
            trade = self.close_both_legs_sequential(trade, verdicts).await?;
        }

        if trade.leg1.filled_qty > self.config.dust_qty {
            return Err(CloseError::VerificationFailed { venue: trade.leg1.venue });
        }
        if trade.leg2.filled_qty > self.config.dust_qty {
            return Err(CloseError::VerificationFailed { venue: trade.leg2.venue });
        }

        trade.status = fab_domain::TradeStatus::Closed;
        trade.close_reason = Some(reason);
        let now = chrono::Utc::now();
        trade.closed_at = Some(now);
        self.trade_store.upsert(&trade).await?;
        self.events
            .publish(DomainEvent::TradeClosed {
                trade_id: trade.id.clone(),
                symbol: trade.symbol.clone(),
                reason,
                realized_pnl_micros: trade.net_pnl().raw(),
                at: now,
            })
            .await;
        Ok(trade)
    }
}
