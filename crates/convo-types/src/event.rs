//! Room-scoped events published for real-time fan-out.

use serde::{Deserialize, Serialize};

/// An event emitted by the orchestrators for downstream consumers
/// (websocket fan-out, cache invalidation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// A new topic was created in the room
    TopicCreated { room_id: String, topic_id: String },
    /// A topic's summary or metadata changed
    TopicUpdated { room_id: String, topic_id: String },
    /// A message was linked to a topic
    MessageAddedToTopic {
        room_id: String,
        topic_id: String,
        message_id: String,
    },
}

impl RoomEvent {
    /// Room this event belongs to.
    pub fn room_id(&self) -> &str {
        match self {
            RoomEvent::TopicCreated { room_id, .. }
            | RoomEvent::TopicUpdated { room_id, .. }
            | RoomEvent::MessageAddedToTopic { room_id, .. } => room_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_room_id() {
        let event = RoomEvent::MessageAddedToTopic {
            room_id: "room-1".to_string(),
            topic_id: "t1".to_string(),
            message_id: "m1".to_string(),
        };
        assert_eq!(event.room_id(), "room-1");
    }

    #[test]
    fn test_event_tagged_serde() {
        let event = RoomEvent::TopicCreated {
            room_id: "room-1".to_string(),
            topic_id: "t1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"topic_created\""));
    }
}
