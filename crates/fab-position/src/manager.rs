//! The Position Manager orchestrator: the per-tick sweep over open trades
//! that evaluates exit rules, rebalances drifted legs, watches for broken
//! hedges, and drives closes to completion. Grounded on the teacher's
//! `check_trades` loop — ref-counted orderbook subscription bookkeeping,
//! bounded-concurrency parallel exit evaluation, sequential handling of
//! trades already mid-close, and per-symbol cooldown maps throttling
//! rebalances and repeated failure logging.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use fab_domain::ports::{EventBus, TradeStore};
use fab_domain::{DomainEvent, Trade, TradeStatus, Venue};
use fab_execution::GateVerdicts;
use fab_marketdata::SharedMarketDataService;
use fab_venue::VenueAdapter;
use futures_util::stream::{self, StreamExt};

use crate::broken_hedge::BrokenHedgeDetector;
use crate::close::PositionCloser;
use crate::config::PositionConfig;
use crate::exit_rules::{evaluate_exit, ExitDecision};
use crate::metrics::ExitMetricsSource;

pub struct PositionManager {
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    trade_store: Arc<dyn TradeStore>,
    events: Arc<dyn EventBus>,
    market_data: SharedMarketDataService,
    metrics_source: Arc<dyn ExitMetricsSource>,
    closer: PositionCloser,
    config: PositionConfig,
    broken_hedge: BrokenHedgeDetector,
    active_orderbook_subs: HashSet<String>,
    rebalance_cooldowns: HashMap<String, Instant>,
    close_failure_alert_last: HashMap<String, Instant>,
}

impl PositionManager {
    pub fn new(
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        trade_store: Arc<dyn TradeStore>,
        events: Arc<dyn EventBus>,
        market_data: SharedMarketDataService,
        metrics_source: Arc<dyn ExitMetricsSource>,
        closer: PositionCloser,
        config: PositionConfig,
    ) -> Self {
        let broken_hedge = BrokenHedgeDetector::new(&config);
        PositionManager {
            venue_a,
            venue_b,
            trade_store,
            events,
            market_data,
            metrics_source,
            closer,
            config,
            broken_hedge,
            active_orderbook_subs: HashSet::new(),
            rebalance_cooldowns: HashMap::new(),
            close_failure_alert_last: HashMap::new(),
        }
    }

    fn adapter_for(&self, venue: Venue) -> &Arc<dyn VenueAdapter> {
        if venue == Venue::VenueA {
            &self.venue_a
        } else {
            &self.venue_b
        }
    }

    /// Whether either leg of `trade` is missing its live position on its
    /// venue right now — the presence/absence signal a notional-drift
    /// comparison against the trade's own recorded fills can never see,
    /// since that drift is computed from the Trade record, not from what
    /// the venue actually holds.
    async fn has_vanished_leg(&self, trade: &Trade) -> bool {
        let leg1_live = self.adapter_for(trade.leg1.venue).get_position(&trade.symbol).await;
        let leg2_live = self.adapter_for(trade.leg2.venue).get_position(&trade.symbol).await;
        match (leg1_live, leg2_live) {
            (Ok(l1), Ok(l2)) => l1.is_none() || l2.is_none(),
            // A fetch error is not evidence of a vanished leg; the periodic
            // reconcile sweep owns venue-unreachable handling, this tick
            // just skips the live check and falls back to recorded drift.
            _ => false,
        }
    }

    fn sync_orderbook_subscriptions(&mut self, symbols: &HashSet<String>) {
        let new_symbols: Vec<String> = symbols.difference(&self.active_orderbook_subs).cloned().collect();
        for symbol in &new_symbols {
            self.market_data.subscribe(symbol);
        }
        let stale_symbols: Vec<String> = self.active_orderbook_subs.difference(symbols).cloned().collect();
        for symbol in &stale_symbols {
            self.market_data.unsubscribe(symbol);
        }
        self.active_orderbook_subs = symbols.clone();
    }

    fn rebalance_throttled(&mut self, symbol: &str, now: Instant) -> bool {
        match self.rebalance_cooldowns.get(symbol) {
            Some(until) if now < *until => true,
            _ => {
                self.rebalance_cooldowns.insert(symbol.to_string(), now + self.config.rebalance_cooldown);
                false
            }
        }
    }

    /// One sweep over every open trade: re-drive in-flight closes first
    /// (sequentially — a half-closed trade must finish before anything else
    /// touches its legs), then fan out exit-rule evaluation across the rest
    /// with bounded concurrency, then apply whatever decisions come back.
    /// Returns the ids of trades this sweep closed.
    pub async fn check_trades(&mut self, verdicts: &GateVerdicts) -> anyhow::Result<Vec<String>> {
        let open_trades = self.trade_store.list_open().await?;
        let symbols: HashSet<String> = open_trades.iter().map(|t| t.symbol.clone()).collect();
        self.sync_orderbook_subscriptions(&symbols);

        let mut closing_now = Vec::new();
        let mut to_evaluate = Vec::new();
        for trade in open_trades {
            match trade.status {
                TradeStatus::Closing => closing_now.push(trade),
                TradeStatus::Open => to_evaluate.push(trade),
                _ => {}
            }
        }

        let mut closed_ids = Vec::new();

        for trade in closing_now {
            let reason = trade.close_reason.unwrap_or(fab_domain::CloseReason::OperatorForced);
            match self.drive_close(trade.clone(), reason, verdicts).await {
                Ok(closed) => closed_ids.push(closed.id),
                Err(e) => {
                    tracing::warn!(symbol = %trade.symbol, error = %e, "retry close failed");
                    self.note_close_failure(&trade.symbol);
                }
            }
        }

        let concurrency = self.config.max_concurrent_exit_checks;
        let metrics_source = self.metrics_source.clone();
        let cfg = self.config.clone();
        let decisions: Vec<(Trade, Option<ExitDecision>)> = stream::iter(to_evaluate)
            .map(|trade| {
                let metrics_source = metrics_source.clone();
                let cfg = cfg.clone();
                async move {
                    match metrics_source.metrics_for(&trade).await {
                        Ok(metrics) => {
                            let decision = evaluate_exit(&cfg, &trade, &metrics);
                            (trade, decision)
                        }
                        Err(e) => {
                            tracing::warn!(symbol = %trade.symbol, error = %e, "exit metrics fetch failed, skipping this tick");
                            (trade, None)
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (trade, decision) in decisions {
            let now = Instant::now();
            let vanished_leg = self.has_vanished_leg(&trade).await;
            let imbalanced = vanished_leg || trade.leg_notional_drift() >= self.config.delta_bound_min_delta_pct;
            if self.broken_hedge.observe(&trade.symbol, imbalanced, now) {
                let detail = if vanished_leg {
                    "live position vanished on one leg's venue".to_string()
                } else {
                    "consecutive delta-bound breaches exceeded tolerance".to_string()
                };
                self.events
                    .publish(DomainEvent::BrokenHedge {
                        trade_id: trade.id.clone(),
                        symbol: trade.symbol.clone(),
                        detail,
                        at: chrono::Utc::now(),
                    })
                    .await;
                match self.drive_close(trade.clone(), fab_domain::CloseReason::BrokenHedge, verdicts).await {
                    Ok(closed) => closed_ids.push(closed.id),
                    Err(e) => tracing::error!(symbol = %trade.symbol, error = %e, "broken-hedge close failed"),
                }
                continue;
            }
            if !imbalanced {
                self.broken_hedge.resume_if_clean(&trade.symbol);
            }

            match decision {
                Some(ExitDecision::Close { reason }) => match self.drive_close(trade.clone(), reason, verdicts).await {
                    Ok(closed) => closed_ids.push(closed.id),
                    Err(e) => {
                        tracing::warn!(symbol = %trade.symbol, error = %e, "close attempt failed, will retry next sweep");
                        self.note_close_failure(&trade.symbol);
                    }
                },
                Some(ExitDecision::Rebalance { reduce_leg, reduce_qty }) => {
                    if self.rebalance_throttled(&trade.symbol, now) {
                        continue;
                    }
                    if let Err(e) = self.closer.rebalance(trade.clone(), reduce_leg, reduce_qty, verdicts).await {
                        tracing::warn!(symbol = %trade.symbol, error = %e, "rebalance failed");
                    }
                }
                None => {}
            }
        }

        Ok(closed_ids)
    }

    fn note_close_failure(&mut self, symbol: &str) {
        let now = Instant::now();
        let should_log = match self.close_failure_alert_last.get(symbol) {
            Some(last) => now.duration_since(*last) > std::time::Duration::from_secs(300),
            None => true,
        };
        if should_log {
            tracing::error!(symbol = %symbol, "repeated close failures for this symbol");
            self.close_failure_alert_last.insert(symbol.to_string(), now);
        }
    }

    async fn drive_close(
        &self,
        mut trade: Trade,
        reason: fab_domain::CloseReason,
        verdicts: &GateVerdicts,
    ) -> anyhow::Result<Trade> {
        trade.status = TradeStatus::Closing;
        trade.close_reason = Some(reason);
        self.trade_store.upsert(&trade).await?;

        let early_tp = matches!(reason, fab_domain::CloseReason::EarlyTakeProfit);
        let closed = if early_tp {
            // Fast path: a profitable close tolerates sequential legs in
            // exchange for tighter per-leg pricing.
            let sequential = self.closer.close_both_legs_sequential(trade, verdicts).await?;
            self.closer.verify_and_finalize(sequential, reason, verdicts).await?
        } else {
            let coordinated = self.closer.close_both_legs_coordinated(trade, verdicts).await?;
            self.closer.verify_and_finalize(coordinated, reason, verdicts).await?
        };
        Ok(closed)
    }

    /// Force-close every open trade with the given reason, used for a
    /// manual or automated full shutdown. Best-effort: failures on one
    /// trade never stop the sweep over the rest.
    pub async fn force_close_all(&self, reason: fab_domain::CloseReason, verdicts: &GateVerdicts) -> Vec<String> {
        let open = match self.trade_store.list_open().await {
            Ok(trades) => trades,
            Err(e) => {
                tracing::error!(error = %e, "failed to list open trades for force close");
                return Vec::new();
            }
        };
        let mut closed = Vec::new();
        for trade in open {
            match self.drive_close(trade.clone(), reason, verdicts).await {
                Ok(t) => closed.push(t.id),
                Err(e) => tracing::error!(symbol = %trade.symbol, error = %e, "force close failed"),
            }
        }
        closed
    }

    /// Explicit operator-triggered close of a single trade by id.
    pub async fn close_trade(&self, trade_id: &str, reason: fab_domain::CloseReason, verdicts: &GateVerdicts) -> anyhow::Result<Trade> {
        let trade = self
            .trade_store
            .get(trade_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no such trade: {trade_id}"))?;
        self.drive_close(trade, reason, verdicts).await
    }

    pub fn is_trading_paused(&self, symbol: &str) -> bool {
        self.broken_hedge.is_trading_paused(symbol, Instant::now())
    }
}

