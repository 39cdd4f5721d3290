//! Conversation windows: gap-delimited runs of messages.
//!
//! Windows are ephemeral. They are produced by the windower, consumed by the
//! analyzer, and never persisted as such; only the resulting thread is.

use chrono::{DateTime, Utc};

use crate::message::{Message, MessageId};

/// A time-bounded run of messages treated as one coherent exchange.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    /// Messages in timestamp order
    pub messages: Vec<Message>,
    /// Message ids, parallel to `messages`
    pub message_ids: Vec<MessageId>,
    /// Distinct sender ids, in order of first appearance
    pub participants: Vec<String>,
    /// Timestamp of the first message
    pub first_message_at: DateTime<Utc>,
    /// Timestamp of the last message
    pub last_message_at: DateTime<Utc>,
}

impl ConversationWindow {
    /// Start a new window from its first message.
    pub fn open(first: Message) -> Self {
        Self {
            message_ids: vec![first.id.clone()],
            participants: vec![first.sender_id.clone()],
            first_message_at: first.timestamp,
            last_message_at: first.timestamp,
            messages: vec![first],
        }
    }

    /// Append a message, tracking participants and the window end.
    pub fn push(&mut self, message: Message) {
        self.message_ids.push(message.id.clone());
        if !self.participants.contains(&message.sender_id) {
            self.participants.push(message.sender_id.clone());
        }
        self.last_message_at = message.timestamp;
        self.messages.push(message);
    }

    /// Number of messages in the window.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Wall-clock span of the window in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.last_message_at.timestamp_millis() - self.first_message_at.timestamp_millis()
    }
}
