//! Execution Gateway — the SINGLE choke-point for all venue order operations.
//!
//! Generalizes the teacher's `BrokerGateway<B>` (which owned one broker
//! adapter for a single-venue equities core) into a stateless dispatcher: this
//! core talks to two venues from the same engine, often within the same
//! attempt, so the gateway takes the target adapter per call instead of
//! owning it. The invariant it enforces is unchanged — every call evaluates
//! three gate verdicts in a fixed order and refuses with `GateRefusal` if any
//! fails:
//!
//! 1. `integrity_armed`  — the system is armed (not disarmed/halted)
//! 2. `risk_allowed`     — the caller's risk check returned Allow
//! 3. `reconcile_clean`  — the most recent reconcile pass was clean
//!
//! `fab-runtime` is the only place that constructs the concrete venue
//! adapters; everything else reaches them exclusively through this gateway.

use fab_venue::{ModifyOrderRequest, PlaceOrderRequest, VenueAdapter, VenueError};

use fab_domain::Order;

/// Pre-evaluated gate verdicts the caller must supply before every venue op.
#[derive(Debug, Clone, Copy)]
pub struct GateVerdicts {
    pub integrity_armed: bool,
    pub risk_allowed: bool,
    pub reconcile_clean: bool,
}

impl GateVerdicts {
    /// All gates clear — convenience helper for paper/test mode.
    pub fn all_clear() -> Self {
        GateVerdicts {
            integrity_armed: true,
            risk_allowed: true,
            reconcile_clean: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateRefusal {
    #[error("GATE_REFUSED: integrity disarmed or halted")]
    IntegrityDisarmed,
    #[error("GATE_REFUSED: risk engine did not allow")]
    RiskBlocked,
    #[error("GATE_REFUSED: reconcile is not clean")]
    ReconcileNotClean,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Gate(#[from] GateRefusal),
    #[error(transparent)]
    Venue(#[from] VenueError),
}

/// Stateless dispatcher wrapping venue adapters with gate enforcement. Holds
/// no adapter of its own — callers pass the target `&dyn VenueAdapter` per
/// call, since a single open attempt touches both venues.
#[derive(Default)]
pub struct ExecutionGateway;

impl ExecutionGateway {
    pub fn new() -> Self {
        ExecutionGateway
    }

    fn enforce_gates(verdicts: &GateVerdicts) -> Result<(), GateRefusal> {
        if !verdicts.integrity_armed {
            return Err(GateRefusal::IntegrityDisarmed);
        }
        if !verdicts.risk_allowed {
            return Err(GateRefusal::RiskBlocked);
        }
        if !verdicts.reconcile_clean {
            return Err(GateRefusal::ReconcileNotClean);
        }
        Ok(())
    }

    pub async fn place_order(
        &self,
        adapter: &dyn VenueAdapter,
        req: PlaceOrderRequest,
        verdicts: &GateVerdicts,
    ) -> Result<Order, GatewayError> {
        Self::enforce_gates(verdicts)?;
        Ok(adapter.place_order(req).await?)
    }

    pub async fn cancel_order(
        &self,
        adapter: &dyn VenueAdapter,
        symbol: &str,
        id: &str,
        verdicts: &GateVerdicts,
    ) -> Result<(), GatewayError> {
        Self::enforce_gates(verdicts)?;
        Ok(adapter.cancel_order(symbol, id).await?)
    }

    pub async fn modify_order(
        &self,
        adapter: &dyn VenueAdapter,
        req: ModifyOrderRequest,
        verdicts: &GateVerdicts,
    ) -> Result<Order, GatewayError> {
        Self::enforce_gates(verdicts)?;
        Ok(adapter.modify_order(req).await?)
    }
}

/// Derive the stable `client_order_id` for a trade leg. Deterministic in the
/// trade id and leg index so a retried submission after a timeout reuses the
/// same key rather than risking a duplicate.
pub fn trade_leg_client_order_id(trade_id: &str, leg: u8) -> String {
    format!("{trade_id}-leg{leg}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fab_domain::{OrderStatus, OrderType, Side, TimeInForce, Venue};
    use fab_venue::{AccountTier, OrderCallback, Position, PositionCallback, VenueResult};
    use std::time::Duration;

    struct AlwaysOkAdapter;

    #[async_trait]
    impl VenueAdapter for AlwaysOkAdapter {
        fn venue(&self) -> Venue {
            Venue::VenueA
        }
        async fn initialize(&self) -> VenueResult<AccountTier> {
            Ok(AccountTier::Standard)
        }
        async fn place_order(&self, req: PlaceOrderRequest) -> VenueResult<Order> {
            Ok(Order {
                id: format!("v-{}", req.client_order_id),
                client_id: req.client_order_id,
                venue: Venue::VenueA,
                symbol: req.symbol,
                side: req.side,
                order_type: req.order_type,
                tif: req.tif,
                qty: req.qty,
                price: req.price,
                status: OrderStatus::Open,
                filled_qty: 0,
                avg_fill_price: None,
                fee: fab_domain::Micros::ZERO,
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
            Ok(Vec::new())
        }
        async fn get_position(&self, _symbol: &str) -> VenueResult<Option<Position>> {
            Ok(None)
        }
        async fn get_available_balance(&self) -> VenueResult<fab_domain::Micros> {
            Ok(fab_domain::Micros::ZERO)
        }
        async fn market_metadata(&self, _symbol: &str) -> VenueResult<fab_venue::MarketMetadata> {
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

    fn req() -> PlaceOrderRequest {
        PlaceOrderRequest {
            client_order_id: "c1".into(),
            symbol: "BTC".into(),
            side: Side::Long,
            order_type: OrderType::Limit,
            tif: TimeInForce::PostOnly,
            qty: 1,
            price: None,
            reduce_only: false,
            slippage_cap: None,
        }
    }

    #[tokio::test]
    async fn all_clear_submit_succeeds() {
        let gw = ExecutionGateway::new();
        let res = gw.place_order(&AlwaysOkAdapter, req(), &GateVerdicts::all_clear()).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn integrity_disarmed_blocks_submit() {
        let gw = ExecutionGateway::new();
        let verdicts = GateVerdicts {
            integrity_armed: false,
            risk_allowed: true,
            reconcile_clean: true,
        };
        let err = gw.place_order(&AlwaysOkAdapter, req(), &verdicts).await.unwrap_err();
        assert!(matches!(err, GatewayError::Gate(GateRefusal::IntegrityDisarmed)));
    }

    #[tokio::test]
    async fn integrity_checked_before_risk_and_reconcile() {
        let gw = ExecutionGateway::new();
        let verdicts = GateVerdicts {
            integrity_armed: false,
            risk_allowed: false,
            reconcile_clean: false,
        };
        let err = gw.place_order(&AlwaysOkAdapter, req(), &verdicts).await.unwrap_err();
        assert!(matches!(err, GatewayError::Gate(GateRefusal::IntegrityDisarmed)));
    }

    #[tokio::test]
    async fn reconcile_not_clean_blocks_submit() {
        let gw = ExecutionGateway::new();
        let verdicts = GateVerdicts {
            integrity_armed: true,
            risk_allowed: true,
            reconcile_clean: false,
        };
        let err = gw.place_order(&AlwaysOkAdapter, req(), &verdicts).await.unwrap_err();
        assert!(matches!(err, GatewayError::Gate(GateRefusal::ReconcileNotClean)));
    }

    #[test]
    fn client_order_id_is_deterministic_per_leg() {
        assert_eq!(trade_leg_client_order_id("t1", 1), trade_leg_client_order_id("t1", 1));
        assert_ne!(trade_leg_client_order_id("t1", 1), trade_leg_client_order_id("t1", 2));
    }
}
