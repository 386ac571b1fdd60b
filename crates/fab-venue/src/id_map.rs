//! Internal (client) → venue order-ID mapping, generalized from
//! `mqk-execution::id_map::BrokerOrderMap` to be venue-keyed: the same
//! `client_order_id` can legitimately be in flight on both venues at once
//! during a Leg1/Leg2 pair, so the map key is `(Venue, client_order_id)`
//! rather than a single global namespace.
//!
//! Same usage contract as the teacher's version: register immediately after
//! a successful submit, look up before every cancel/replace, deregister on
//! terminal state. A missing mapping must abort the operation — never
//! fabricate a venue order id.

use std::collections::HashMap;
use std::sync::RwLock;

use fab_domain::Venue;

#[derive(Default)]
pub struct VenueOrderMap {
    map: RwLock<HashMap<(Venue, String), String>>,
}

impl VenueOrderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, venue: Venue, client_order_id: impl Into<String>, venue_order_id: impl Into<String>) {
        self.map
            .write()
            .expect("VenueOrderMap lock poisoned")
            .insert((venue, client_order_id.into()), venue_order_id.into());
    }

    pub fn venue_order_id(&self, venue: Venue, client_order_id: &str) -> Option<String> {
        self.map
            .read()
            .expect("VenueOrderMap lock poisoned")
            .get(&(venue, client_order_id.to_string()))
            .cloned()
    }

    pub fn deregister(&self, venue: Venue, client_order_id: &str) {
        self.map
            .write()
            .expect("VenueOrderMap lock poisoned")
            .remove(&(venue, client_order_id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.map.read().expect("VenueOrderMap lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_client_id_on_both_venues_does_not_collide() {
        let map = VenueOrderMap::new();
        map.register(Venue::VenueA, "c1", "a-order-1");
        map.register(Venue::VenueB, "c1", "b-order-1");
        assert_eq!(map.venue_order_id(Venue::VenueA, "c1").as_deref(), Some("a-order-1"));
        assert_eq!(map.venue_order_id(Venue::VenueB, "c1").as_deref(), Some("b-order-1"));
    }

    #[test]
    fn deregister_removes_only_targeted_entry() {
        let map = VenueOrderMap::new();
        map.register(Venue::VenueA, "c1", "a-order-1");
        map.register(Venue::VenueB, "c1", "b-order-1");
        map.deregister(Venue::VenueA, "c1");
        assert!(map.venue_order_id(Venue::VenueA, "c1").is_none());
        assert!(map.venue_order_id(Venue::VenueB, "c1").is_some());
    }

    #[test]
    fn unknown_id_returns_none() {
        let map = VenueOrderMap::new();
        assert!(map.venue_order_id(Venue::VenueA, "nope").is_none());
    }
}
