//! `VenueAdapter`: the async contract every concrete venue integration
//! implements, generalizing `mqk-execution::order_router::BrokerAdapter`
//! (sync, submit/cancel/replace only) into the full surface a dual-venue
//! delta-neutral core needs — account warm-up, order lifecycle, position and
//! balance reads, funding-rate polling, and the three push-subscription
//! feeds (positions, orders, orderbook).

use async_trait::async_trait;

use fab_domain::{Order, OrderStatus, OrderType, Side, TimeInForce, Venue};

use crate::metadata::MarketMetadata;

#[derive(Clone, Debug)]
pub struct PlaceOrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub tif: TimeInForce,
    pub qty: i64,
    pub price: Option<fab_domain::Micros>,
    pub reduce_only: bool,
    /// Maximum acceptable slippage from `price` for a marketable order, in
    /// the same micros scale. `None` for resting post-only orders.
    pub slippage_cap: Option<fab_domain::Micros>,
}

#[derive(Clone, Debug)]
pub struct ModifyOrderRequest {
    pub order_id: String,
    pub new_price: Option<fab_domain::Micros>,
    pub new_qty: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub entry_price: fab_domain::Micros,
    pub liquidation_price: Option<fab_domain::Micros>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountTier {
    Standard,
    Premium,
}

/// Error taxonomy per spec §7. Transient/Auth are retryable by the caller;
/// everything else is surfaced as a typed rejection.
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("transient I/O error: {0}")]
    Transient(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("order rejected: {0}")]
    OrderRejected(String),
    #[error("unknown order: {venue:?}/{id}")]
    UnknownOrder { venue: Venue, id: String },
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: std::time::Duration },
}

pub type VenueResult<T> = Result<T, VenueError>;

/// Callback invoked for each push update on a subscription. Boxed to keep
/// the trait object-safe without an associated-type callback parameter.
pub type PositionCallback = Box<dyn Fn(Position) + Send + Sync>;
pub type OrderCallback = Box<dyn Fn(Order) + Send + Sync>;

#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Warm the HTTP pool, fetch market metadata, and detect the account
    /// tier that sets request-rate budgets and fee schedules.
    async fn initialize(&self) -> VenueResult<AccountTier>;

    async fn place_order(&self, req: PlaceOrderRequest) -> VenueResult<Order>;

    /// WS fill-cache first, then active orders, then recent inactive orders.
    async fn get_order(&self, symbol: &str, id: &str) -> VenueResult<Order>;

    async fn cancel_order(&self, symbol: &str, id: &str) -> VenueResult<()>;

    async fn modify_order(&self, req: ModifyOrderRequest) -> VenueResult<Order>;

    async fn cancel_all_orders(&self, symbol: &str) -> VenueResult<u32>;

    async fn list_positions(&self) -> VenueResult<Vec<Position>>;

    async fn get_position(&self, symbol: &str) -> VenueResult<Option<Position>>;

    async fn get_available_balance(&self) -> VenueResult<fab_domain::Micros>;

    /// Tick/step size, min qty/notional, and fee schedule for `symbol`.
    /// Cached internally per venue with a tier-dependent TTL; a cache miss
    /// or expiry triggers a lazy refetch.
    async fn market_metadata(&self, symbol: &str) -> VenueResult<MarketMetadata>;

    /// Normalized-to-hourly, clamped to the venue's documented cap.
    async fn get_funding_rate(&self, symbol: &str) -> VenueResult<f64>;

    async fn subscribe_positions(&self, callback: PositionCallback) -> VenueResult<()>;

    async fn subscribe_orders(&self, callback: OrderCallback) -> VenueResult<()>;

    async fn subscribe_orderbook(&self, symbol: &str) -> VenueResult<()>;

    /// Pre-warm the persistent trading WS ahead of a latency-sensitive
    /// submission burst.
    async fn ensure_trading_ws(&self, timeout: std::time::Duration) -> VenueResult<()>;
}

/// Default terminal-status check shared by adapters implementing the
/// "cancel of a terminal order is a no-op" boundary behavior (spec §8).
pub fn cancel_is_noop(status: OrderStatus) -> bool {
    status.is_terminal()
}
