//! Scenario: a position exists on venue A but not B for three consecutive
//! checks spanning the minimum observation window.
//!
//! # Invariants under test
//!
//! 1. A single mismatched sweep alone does not trip anything.
//! 2. Once the mismatch survives enough consecutive sweeps across the
//!    observation window, `BrokenHedge` is published, the system disarms,
//!    and the unmatched leg on venue A is flattened.
//! 3. The system stays disarmed through the cooldown even once venue A goes
//!    clean, and only re-arms once the cooldown elapses and a sweep finds
//!    both venues balanced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fab_domain::{
    DomainEvent, EventBus, ExecutionState, Micros, Order, OrderStatus, Side, Trade, TradeLeg,
    TradeStatus, TradeStore, Venue,
};
use fab_execution::GateVerdicts;
use fab_reconcile::{BrokenHedgeConfig, GhostPolicy, Reconciler};
use fab_venue::{
    AccountTier, MarketMetadata, ModifyOrderRequest, OrderCallback, PlaceOrderRequest, Position,
    PositionCallback, VenueAdapter, VenueError, VenueResult,
};

struct InMemoryTradeStore {
    trades: Mutex<Vec<Trade>>,
}

impl InMemoryTradeStore {
    fn new(trades: Vec<Trade>) -> Self {
        InMemoryTradeStore { trades: Mutex::new(trades) }
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn upsert(&self, trade: &Trade) -> anyhow::Result<()> {
        let mut trades = self.trades.lock().unwrap();
        if let Some(existing) = trades.iter_mut().find(|t| t.id == trade.id) {
            *existing = trade.clone();
        } else {
            trades.push(trade.clone());
        }
        Ok(())
    }
    async fn get(&self, trade_id: &str) -> anyhow::Result<Option<Trade>> {
        Ok(self.trades.lock().unwrap().iter().find(|t| t.id == trade_id).cloned())
    }
    async fn list_open(&self) -> anyhow::Result<Vec<Trade>> {
        Ok(self.trades.lock().unwrap().iter().filter(|t| t.is_open()).cloned().collect())
    }
    async fn list_by_symbol(&self, symbol: &str) -> anyhow::Result<Vec<Trade>> {
        Ok(self.trades.lock().unwrap().iter().filter(|t| t.symbol == symbol).cloned().collect())
    }
}

struct RecordingEventBus {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventBus {
    fn new() -> Self {
        RecordingEventBus { events: Mutex::new(Vec::new()) }
    }
    fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct StubAdapter {
    venue: Venue,
    positions: Mutex<Vec<Position>>,
    seq: AtomicU64,
}

impl StubAdapter {
    fn new(venue: Venue, positions: Vec<Position>) -> Self {
        StubAdapter { venue, positions: Mutex::new(positions), seq: AtomicU64::new(0) }
    }
    fn clear_symbol(&self, symbol: &str) {
        self.positions.lock().unwrap().retain(|p| p.symbol != symbol);
    }
}

#[async_trait]
impl VenueAdapter for StubAdapter {
    fn venue(&self) -> Venue {
        self.venue
    }
    async fn initialize(&self) -> VenueResult<AccountTier> {
        Ok(AccountTier::Standard)
    }
    async fn place_order(&self, req: PlaceOrderRequest) -> VenueResult<Order> {
        let id = format!("stub-{}", self.seq.fetch_add(1, Ordering::SeqCst));
        self.positions.lock().unwrap().retain(|p| p.symbol != req.symbol);
        Ok(Order {
            id,
            client_id: req.client_order_id,
            venue: self.venue,
            symbol: req.symbol,
            side: req.side,
            order_type: req.order_type,
            tif: req.tif,
            qty: req.qty,
            price: req.price,
            status: OrderStatus::Filled,
            filled_qty: req.qty,
            avg_fill_price: Some(Micros::new(100_000_000)),
            fee: Micros::ZERO,
            reduce_only: req.reduce_only,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
    }
    async fn get_order(&self, _symbol: &str, _id: &str) -> VenueResult<Order> {
        unimplemented!()
    }
    async fn cancel_order(&self, _symbol: &str, _id: &str) -> VenueResult<()> {
        Ok(())
    }
    async fn modify_order(&self, _req: ModifyOrderRequest) -> VenueResult<Order> {
        unimplemented!()
    }
    async fn cancel_all_orders(&self, _symbol: &str) -> VenueResult<u32> {
        Ok(0)
    }
    async fn list_positions(&self) -> VenueResult<Vec<Position>> {
        Ok(self.positions.lock().unwrap().clone())
    }
    async fn get_position(&self, symbol: &str) -> VenueResult<Option<Position>> {
        Ok(self.positions.lock().unwrap().iter().find(|p| p.symbol == symbol).cloned())
    }
    async fn get_available_balance(&self) -> VenueResult<Micros> {
        Ok(Micros::ZERO)
    }
    async fn market_metadata(&self, _symbol: &str) -> VenueResult<MarketMetadata> {
        unimplemented!()
    }
    async fn get_funding_rate(&self, _symbol: &str) -> VenueResult<f64> {
        Ok(0.0)
    }
    async fn subscribe_positions(&self, _callback: PositionCallback) -> VenueResult<()> {
        Ok(())
    }
    async fn subscribe_orders(&self, _callback: OrderCallback) -> VenueResult<()> {
        Ok(())
    }
    async fn subscribe_orderbook(&self, _symbol: &str) -> VenueResult<()> {
        Ok(())
    }
    async fn ensure_trading_ws(&self, _timeout: Duration) -> VenueResult<()> {
        Ok(())
    }
}

fn open_trade(id: &str, symbol: &str) -> Trade {
    let now = chrono::Utc::now();
    Trade {
        id: id.into(),
        symbol: symbol.into(),
        status: TradeStatus::Open,
        execution_state: ExecutionState::Complete,
        leg1: TradeLeg { filled_qty: 10, entry_price: Some(Micros::new(100_000_000)), ..TradeLeg::new(Venue::VenueA, Side::Long, 10) },
        leg2: TradeLeg { filled_qty: 10, entry_price: Some(Micros::new(100_300_000)), ..TradeLeg::new(Venue::VenueB, Side::Short, 10) },
        target_qty: 10,
        target_notional: Micros::new(1_000_000_000),
        entry_apy: 0.3,
        created_at: now,
        opened_at: Some(now),
        closed_at: None,
        realized_pnl: Micros::ZERO,
        funding_collected: Micros::ZERO,
        close_reason: None,
    }
}

fn fast_broken_hedge_config() -> BrokenHedgeConfig {
    // Real thresholds (3 hits, >=45s, 900s cooldown) would make this test
    // take fifteen minutes; scale both windows down by the same factor so
    // the same consecutive-hits/observation/cooldown shape is exercised.
    BrokenHedgeConfig {
        consecutive_hits_required: 3,
        min_observation: Duration::from_millis(20),
        cooldown: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn a_single_mismatched_sweep_does_not_trip_broken_hedge() {
    let trade_store = Arc::new(InMemoryTradeStore::new(vec![open_trade("t1", "BTC")]));
    let events = Arc::new(RecordingEventBus::new());
    let venue_a: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(
        Venue::VenueA,
        vec![Position { symbol: "BTC".into(), side: Side::Long, qty: 10, entry_price: Micros::new(100_000_000), liquidation_price: None }],
    ));
    let venue_b: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueB, vec![]));
    let mut reconciler = Reconciler::new(venue_a, venue_b, trade_store, events.clone(), GhostPolicy::Flatten, fast_broken_hedge_config());

    let outcome = reconciler.run(true, &GateVerdicts::all_clear()).await.unwrap();

    assert!(outcome.broken_hedges_flattened.is_empty());
    assert!(!events.events().iter().any(|e| matches!(e, DomainEvent::BrokenHedge { .. })));
    assert!(reconciler.arm_state().is_armed() || reconciler.arm_state().is_disarmed());
}

#[tokio::test]
async fn three_consecutive_mismatched_sweeps_trip_disarm_and_flatten() {
    let trade_store = Arc::new(InMemoryTradeStore::new(vec![open_trade("t1", "BTC")]));
    let events = Arc::new(RecordingEventBus::new());
    let venue_a: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(
        Venue::VenueA,
        vec![Position { symbol: "BTC".into(), side: Side::Long, qty: 10, entry_price: Micros::new(100_000_000), liquidation_price: None }],
    ));
    let venue_b: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueB, vec![]));
    let mut reconciler = Reconciler::new(
        Arc::clone(&venue_a),
        venue_b,
        trade_store,
        events.clone(),
        GhostPolicy::Flatten,
        fast_broken_hedge_config(),
    );

    let mut tripped = false;
    for _ in 0..5 {
        let outcome = reconciler.run(false, &GateVerdicts::all_clear()).await.unwrap();
        if !outcome.broken_hedges_flattened.is_empty() {
            tripped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    assert!(tripped, "broken hedge never tripped across repeated mismatched sweeps");
    assert!(reconciler.arm_state().is_disarmed());
    assert!(events.events().iter().any(|e| matches!(e, DomainEvent::BrokenHedge { symbol, .. } if symbol == "BTC")));
    // The unmatched leg on venue A was flattened by the self-heal.
    assert!(venue_a.list_positions().await.unwrap().is_empty());
}

#[tokio::test]
async fn stays_disarmed_through_cooldown_then_rearms_on_a_clean_sweep() {
    let trade_store = Arc::new(InMemoryTradeStore::new(vec![open_trade("t1", "BTC")]));
    let events = Arc::new(RecordingEventBus::new());
    let venue_a = Arc::new(StubAdapter::new(
        Venue::VenueA,
        vec![Position { symbol: "BTC".into(), side: Side::Long, qty: 10, entry_price: Micros::new(100_000_000), liquidation_price: None }],
    ));
    let venue_b: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueB, vec![]));
    let venue_a_dyn: Arc<dyn VenueAdapter> = venue_a.clone();
    let mut reconciler = Reconciler::new(venue_a_dyn, venue_b, trade_store, events, GhostPolicy::Flatten, fast_broken_hedge_config());

    let mut tripped = false;
    for _ in 0..5 {
        let outcome = reconciler.run(false, &GateVerdicts::all_clear()).await.unwrap();
        if !outcome.broken_hedges_flattened.is_empty() {
            tripped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    assert!(tripped);
    assert!(reconciler.arm_state().is_disarmed());

    // Venue A is now flat too (self-heal already closed it out) so the very
    // next sweep is clean on paper, but the cooldown has not elapsed yet.
    tokio::time::sleep(Duration::from_millis(2)).await;
    let still_cooling = reconciler.run(false, &GateVerdicts::all_clear()).await.unwrap();
    assert!(still_cooling.is_clean());
    assert!(reconciler.arm_state().is_disarmed(), "must not re-arm before the cooldown elapses");

    tokio::time::sleep(Duration::from_millis(150)).await;
    let after_cooldown = reconciler.run(false, &GateVerdicts::all_clear()).await.unwrap();
    assert!(after_cooldown.is_clean());
    assert!(reconciler.arm_state().is_armed(), "must re-arm once the cooldown elapses on a clean sweep");
}
