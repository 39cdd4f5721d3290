//! Room event fan-out.

use tokio::sync::broadcast;
use tracing::debug;

use convo_types::RoomEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel for room-scoped events.
///
/// Clones share the same channel. Publishing with no subscribers is not
/// an error; events are fire-and-forget.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: RoomEvent) {
        debug!(room_id = %event.room_id(), "publishing room event");
        // A send error just means nobody is listening right now
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(RoomEvent::TopicCreated {
            room_id: "room-1".to_string(),
            topic_id: "t1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.room_id(), "room-1");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(RoomEvent::TopicUpdated {
            room_id: "room-1".to_string(),
            topic_id: "t1".to_string(),
        });
    }
}
