//! Scenario: closing an already-open pair.
//!
//! # Invariants under test
//!
//! 1. `close_both_legs_coordinated` against a StubAdapter that fills every
//!    maker order immediately leaves both legs at zero filled quantity.
//! 2. `verify_and_finalize` after a successful close marks the trade
//!    `Closed` with the supplied reason and publishes `TradeClosed`.
//! 3. `rebalance` against the larger leg reduces only that leg's filled
//!    quantity, leaving the other leg untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fab_domain::{
    BookLevel, CloseReason, DomainEvent, EventBus, Micros, Order, OrderStatus, Side, TimeInForce,
    Trade, TradeLeg, TradeStatus, TradeStore, Venue,
};
use fab_execution::GateVerdicts;
use fab_marketdata::{FillCache, MarketDataService, StalenessConfig};
use fab_position::PositionCloser;
use fab_venue::{
    AccountTier, MarketMetadata, ModifyOrderRequest, OrderCallback, PlaceOrderRequest, Position,
    PositionCallback, VenueAdapter, VenueError, VenueResult,
};

struct InMemoryTradeStore {
    trades: Mutex<Vec<Trade>>,
}

impl InMemoryTradeStore {
    fn new() -> Self {
        InMemoryTradeStore { trades: Mutex::new(Vec::new()) }
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
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct StubAdapter {
    venue: Venue,
    fill_cache: Arc<FillCache>,
    seq: AtomicU64,
    /// When false, a POST_ONLY order is left resting (`Open`, unfilled)
    /// instead of filled immediately, so a caller's maker-wait times out and
    /// falls through to an IOC escalation. Non-POST_ONLY orders always fill.
    fill_maker: bool,
}

impl StubAdapter {
    fn new(venue: Venue, fill_cache: Arc<FillCache>) -> Self {
        StubAdapter { venue, fill_cache, seq: AtomicU64::new(0), fill_maker: true }
    }

    fn with_fill_maker(mut self, fill_maker: bool) -> Self {
        self.fill_maker = fill_maker;
        self
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
        let stalled = req.tif == TimeInForce::PostOnly && !self.fill_maker;
        let order = Order {
            id,
            client_id: req.client_order_id,
            venue: self.venue,
            symbol: req.symbol,
            side: req.side,
            order_type: req.order_type,
            tif: req.tif,
            qty: req.qty,
            price: req.price,
            status: if stalled { OrderStatus::Open } else { OrderStatus::Filled },
            filled_qty: if stalled { 0 } else { req.qty },
            avg_fill_price: req.price.or(Some(Micros::new(100_000_000))),
            fee: Micros::ZERO,
            reduce_only: req.reduce_only,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.fill_cache.record_update(self.venue, order.clone());
        self.fill_cache.link_order_id(self.venue, &order.client_id, &order.id);
        Ok(order)
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
        Ok(Vec::new())
    }
    async fn get_position(&self, _symbol: &str) -> VenueResult<Option<Position>> {
        Ok(None)
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

fn open_trade() -> Trade {
    let now = chrono::Utc::now();
    Trade {
        id: "close-t1".into(),
        symbol: "BTC".into(),
        status: TradeStatus::Open,
        execution_state: fab_domain::ExecutionState::Complete,
        leg1: TradeLeg {
            filled_qty: 10,
            entry_price: Some(Micros::new(100_000_000)),
            ..TradeLeg::new(Venue::VenueA, Side::Long, 10)
        },
        leg2: TradeLeg {
            filled_qty: 10,
            entry_price: Some(Micros::new(100_300_000)),
            ..TradeLeg::new(Venue::VenueB, Side::Short, 10)
        },
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

fn seeded_market_data(symbol: &str) -> Arc<MarketDataService> {
    use fab_marketdata::orderbook::BookUpdate;
    let md = Arc::new(MarketDataService::new(StalenessConfig::default()));
    md.subscribe(symbol);
    md.apply_update(
        symbol,
        Venue::VenueA,
        BookUpdate {
            begin_nonce: 0,
            end_nonce: 1,
            bids: vec![BookLevel { price: Micros::new(100_000_000), qty: 100 }],
            asks: vec![BookLevel { price: Micros::new(100_100_000), qty: 100 }],
            is_snapshot: true,
        },
    );
    md.apply_update(
        symbol,
        Venue::VenueB,
        BookUpdate {
            begin_nonce: 0,
            end_nonce: 1,
            bids: vec![BookLevel { price: Micros::new(100_300_000), qty: 100 }],
            asks: vec![BookLevel { price: Micros::new(100_400_000), qty: 100 }],
            is_snapshot: true,
        },
    );
    md
}

fn build_closer(market_data: Arc<MarketDataService>, trade_store: Arc<InMemoryTradeStore>, events: Arc<RecordingEventBus>) -> PositionCloser {
    let fill_cache_a = Arc::new(FillCache::new());
    let fill_cache_b = Arc::new(FillCache::new());
    let venue_a: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueA, fill_cache_a.clone()));
    let venue_b: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueB, fill_cache_b.clone()));
    PositionCloser::new(venue_a, venue_b, fill_cache_a, fill_cache_b, market_data, trade_store, events, fab_position::PositionConfig::default())
}

#[tokio::test]
async fn coordinated_close_flattens_both_legs() {
    let trade = open_trade();
    let market_data = seeded_market_data(&trade.symbol);
    let trade_store = Arc::new(InMemoryTradeStore::new());
    let events = Arc::new(RecordingEventBus::new());
    let closer = build_closer(market_data, trade_store, events);

    let closed = closer
        .close_both_legs_coordinated(trade, &GateVerdicts::all_clear())
        .await
        .expect("coordinated close should succeed");

    assert_eq!(closed.leg1.filled_qty, 0);
    assert_eq!(closed.leg2.filled_qty, 0);
}

#[tokio::test]
async fn verify_and_finalize_marks_trade_closed_and_publishes_event() {
    let trade = open_trade();
    let market_data = seeded_market_data(&trade.symbol);
    let trade_store = Arc::new(InMemoryTradeStore::new());
    let events = Arc::new(RecordingEventBus::new());
    let closer = build_closer(market_data, trade_store.clone(), events.clone());

    let closed = closer
        .close_both_legs_coordinated(trade, &GateVerdicts::all_clear())
        .await
        .unwrap();
    let finalized = closer
        .verify_and_finalize(closed, CloseReason::ProfitTarget, &GateVerdicts::all_clear())
        .await
        .expect("verification should pass with both legs flat");

    assert_eq!(finalized.status, TradeStatus::Closed);
    assert_eq!(finalized.close_reason, Some(CloseReason::ProfitTarget));
    assert!(events
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, DomainEvent::TradeClosed { reason: CloseReason::ProfitTarget, .. })));
}

#[tokio::test]
async fn rebalance_reduces_only_the_targeted_leg() {
    let mut trade = open_trade();
    trade.leg1.filled_qty = 15;
    trade.leg2.filled_qty = 10;
    let market_data = seeded_market_data(&trade.symbol);
    let trade_store = Arc::new(InMemoryTradeStore::new());
    let events = Arc::new(RecordingEventBus::new());
    let closer = build_closer(market_data, trade_store, events);

    let rebalanced = closer
        .rebalance(trade, Side::Long, 5, &GateVerdicts::all_clear())
        .await
        .expect("rebalance should succeed");

    assert_eq!(rebalanced.leg1.filled_qty, 10);
    assert_eq!(rebalanced.leg2.filled_qty, 10);
}

/// Seed scenario: one leg's maker close fills, the other's doesn't within
/// the maker wait and has to be escalated to IOC. Both legs must still end
/// up flat with an exit price recorded.
#[tokio::test]
async fn coordinated_close_escalates_a_stalled_maker_leg_to_ioc() {
    let trade = open_trade();
    let market_data = seeded_market_data(&trade.symbol);
    let trade_store = Arc::new(InMemoryTradeStore::new());
    let events = Arc::new(RecordingEventBus::new());

    let fill_cache_a = Arc::new(FillCache::new());
    let fill_cache_b = Arc::new(FillCache::new());
    let venue_a: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueA, fill_cache_a.clone()));
    let venue_b: Arc<dyn VenueAdapter> = Arc::new(StubAdapter::new(Venue::VenueB, fill_cache_b.clone()).with_fill_maker(false));
    let config = fab_position::PositionConfig { maker_order_timeout: Duration::from_millis(30), ..fab_position::PositionConfig::default() };
    let closer = PositionCloser::new(venue_a, venue_b, fill_cache_a, fill_cache_b, market_data, trade_store, events, config);

    let closed = closer
        .close_both_legs_coordinated(trade, &GateVerdicts::all_clear())
        .await
        .expect("coordinated close should succeed");

    assert_eq!(closed.leg1.filled_qty, 0);
    assert_eq!(closed.leg2.filled_qty, 0);
    assert!(closed.leg1.exit_price.is_some());
    assert!(closed.leg2.exit_price.is_some());
    assert_eq!(closed.status, TradeStatus::Open);
}
