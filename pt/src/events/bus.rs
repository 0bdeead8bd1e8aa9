//! Event bus - pub/sub feed of in-world events
//!
//! Uses a tokio broadcast channel so every subscriber sees every event
//! with minimal latency. Emitting is fire-and-forget: with no
//! subscribers the event is dropped, and a full channel drops the
//! oldest events first.

use tokio::sync::broadcast;
use tracing::debug;

use super::GameEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: GameEvent) {
        debug!(kind = event.kind(), location = %event.location(), "EventBus::emit");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocationId;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(GameEvent::ZoneChanged { location: LocationId(522) });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, GameEvent::ZoneChanged { location: LocationId(522) });
    }

    #[test]
    fn test_event_bus_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(GameEvent::ZoneChanged { location: LocationId(1) });
    }
}
