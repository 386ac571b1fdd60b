//! Pure, deterministic zombie/ghost/side-mismatch detection.
//!
//! Generalizes the teacher's order-by-order `reconcile()` (which diffed two
//! flat order/position maps) to a Trade-level comparison across two venues:
//! a Trade is only consistent if each of its legs is backed by a live
//! position of the matching side on that leg's venue.

use std::collections::HashMap;

use fab_domain::{Side, Trade, TradeStatus, Venue};

use crate::types::{
    BrokenHedgeTrade, GhostPosition, LivePosition, ReconcileReport, SideMismatch, VenueSnapshot, ZombieTrade,
};

fn snapshot_for<'a>(venue: Venue, venue_a: &'a VenueSnapshot, venue_b: &'a VenueSnapshot) -> &'a VenueSnapshot {
    if venue_a.venue == venue {
        venue_a
    } else {
        venue_b
    }
}

fn live_position<'a>(snap: &'a VenueSnapshot, symbol: &str) -> Option<&'a LivePosition> {
    snap.positions.get(symbol)
}

/// Compare the store's OPEN trades against both venues' live positions.
///
/// - A Trade is a **zombie** when neither leg's venue shows a live position
///   for that symbol.
/// - A Trade with a live position on exactly one leg's venue and nothing on
///   the other is a **broken hedge** — a single unhedged leg rather than a
///   fully vanished position.
/// - A leg whose live position side contradicts the Trade's recorded side is
///   a **side mismatch** — logged, never auto-corrected.
/// - A live position with no OPEN Trade referencing that venue+symbol is a
///   **ghost**.
pub fn reconcile(open_trades: &[Trade], venue_a: &VenueSnapshot, venue_b: &VenueSnapshot) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    // referenced[(venue, symbol)] = true once some OPEN trade claims it.
    let mut referenced: HashMap<(Venue, String), bool> = HashMap::new();

    for trade in open_trades {
        if trade.status != TradeStatus::Open {
            continue;
        }
        let leg1_snap = snapshot_for(trade.leg1.venue, venue_a, venue_b);
        let leg2_snap = snapshot_for(trade.leg2.venue, venue_a, venue_b);
        let leg1_live = live_position(leg1_snap, &trade.symbol);
        let leg2_live = live_position(leg2_snap, &trade.symbol);

        referenced.insert((trade.leg1.venue, trade.symbol.clone()), true);
        referenced.insert((trade.leg2.venue, trade.symbol.clone()), true);

        if leg1_live.is_none() && leg2_live.is_none() {
            report.zombies.push(ZombieTrade { trade_id: trade.id.clone(), symbol: trade.symbol.clone() });
            continue;
        }

        match (leg1_live, leg2_live) {
            (Some(live), None) => {
                report.broken_hedges.push(BrokenHedgeTrade {
                    trade_id: trade.id.clone(),
                    symbol: trade.symbol.clone(),
                    live_venue: trade.leg1.venue,
                    live_side: live.side,
                    live_qty: live.qty,
                    missing_venue: trade.leg2.venue,
                });
                continue;
            }
            (None, Some(live)) => {
                report.broken_hedges.push(BrokenHedgeTrade {
                    trade_id: trade.id.clone(),
                    symbol: trade.symbol.clone(),
                    live_venue: trade.leg2.venue,
                    live_side: live.side,
                    live_qty: live.qty,
                    missing_venue: trade.leg1.venue,
                });
                continue;
            }
            (Some(_), Some(_)) => {}
            (None, None) => unreachable!("handled by the zombie branch above"),
        }

        check_side(trade, trade.leg1.venue, trade.leg1.side, leg1_live, &mut report);
        check_side(trade, trade.leg2.venue, trade.leg2.side, leg2_live, &mut report);
    }

    for snap in [venue_a, venue_b] {
        for (symbol, pos) in &snap.positions {
            let key = (snap.venue, symbol.clone());
            if !referenced.contains_key(&key) {
                report.ghosts.push(GhostPosition {
                    venue: snap.venue,
                    symbol: symbol.clone(),
                    side: pos.side,
                    qty: pos.qty,
                });
            }
        }
    }

    report
}

fn check_side(trade: &Trade, venue: Venue, trade_side: Side, live: Option<&LivePosition>, report: &mut ReconcileReport) {
    if let Some(live) = live {
        if live.side != trade_side {
            report.side_mismatches.push(SideMismatch {
                trade_id: trade.id.clone(),
                venue,
                symbol: trade.symbol.clone(),
                trade_side,
                live_side: live.side,
            });
        }
    }
}
