//! In-memory [`EventBus`] that records every published event for test
//! assertions, and an optional broadcast variant for consumers that want to
//! subscribe to the live stream the way a real notification sink would.

use std::sync::Mutex;

use async_trait::async_trait;
use fab_domain::ports::EventBus;
use fab_domain::DomainEvent;

#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        RecordingEventBus { events: Mutex::new(Vec::new()) }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Records events like [`RecordingEventBus`] and additionally fans them out
/// on a `tokio::sync::broadcast` channel, for `fab-runtime`'s default mode
/// where a supervisor task wants to observe events as they happen rather
/// than poll a log after the fact. Lagging subscribers drop the oldest
/// events per `tokio::sync::broadcast`'s normal semantics — matching
/// `EventBus::publish`'s contract that publish must never block on a slow
/// consumer.
pub struct BroadcastEventBus {
    events: Mutex<Vec<DomainEvent>>,
    tx: tokio::sync::broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(capacity);
        BroadcastEventBus { events: Mutex::new(Vec::new()), tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event.clone());
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn recording_bus_records_events_in_order() {
        let bus = RecordingEventBus::new();
        bus.publish(DomainEvent::SystemArmed { at: Utc::now() }).await;
        bus.publish(DomainEvent::ReconcileClean { at: Utc::now() }).await;
        assert_eq!(bus.len(), 2);
    }

    #[tokio::test]
    async fn broadcast_bus_delivers_to_subscriber() {
        let bus = BroadcastEventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::SystemArmed { at: Utc::now() }).await;
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, DomainEvent::SystemArmed { .. }));
        assert_eq!(bus.events().len(), 1);
    }
}
