//! Thread, decision, and open-item records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::message::MessageId;

/// Processing state of a thread row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Created but analysis not yet persisted
    Pending,
    /// Analysis complete
    Complete,
}

/// A persisted, analyzed conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Unique identifier (ULID string)
    pub id: String,
    /// Room the thread belongs to
    pub room_id: String,
    /// Assigned category
    pub category: Category,
    /// Short descriptive title
    pub title: String,
    /// Factual summary of the exchange
    pub summary: String,
    /// Number of messages in the window
    pub message_count: usize,
    /// Timestamp of the first message
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub first_message_at: DateTime<Utc>,
    /// Timestamp of the last message
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_message_at: DateTime<Utc>,
    /// Analysis confidence in [0, 1]
    pub ai_confidence: f32,
    /// Processing state
    pub processing_status: ProcessingStatus,
    /// When the thread row was created
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// An agreement extracted from a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique identifier (ULID string)
    pub id: String,
    /// Owning thread
    pub thread_id: String,
    /// What was decided
    pub text: String,
    /// Sender id of the participant who agreed, if identified
    #[serde(default)]
    pub decided_by: Option<String>,
    /// Messages substantiating the decision; always a subset of the
    /// thread's messages
    pub source_message_ids: Vec<MessageId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        thread_id: impl Into<String>,
        text: impl Into<String>,
        decided_by: Option<String>,
        source_message_ids: Vec<MessageId>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            thread_id: thread_id.into(),
            text: text.into(),
            decided_by,
            source_message_ids,
            created_at: Utc::now(),
        }
    }
}

/// Resolution state of an open item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenItemStatus {
    Open,
    Resolved,
}

/// An unresolved question or pending task extracted from a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenItem {
    /// Unique identifier (ULID string)
    pub id: String,
    /// Owning thread
    pub thread_id: String,
    /// What needs follow-up
    pub text: String,
    /// Sender id of the participant responsible, if identified
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Messages substantiating the item
    pub source_message_ids: Vec<MessageId>,
    pub status: OpenItemStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OpenItem {
    pub fn new(
        thread_id: impl Into<String>,
        text: impl Into<String>,
        assigned_to: Option<String>,
        source_message_ids: Vec<MessageId>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            thread_id: thread_id.into(),
            text: text.into(),
            assigned_to,
            source_message_ids,
            status: OpenItemStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Mark resolved, stamping the resolution time.
    pub fn resolve(&mut self) {
        self.status = OpenItemStatus::Resolved;
        self.resolved_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_item_resolve() {
        let mut item = OpenItem::new("thread-1", "Confirm Friday pickup", None, vec![]);
        assert_eq!(item.status, OpenItemStatus::Open);
        assert!(item.resolved_at.is_none());

        item.resolve();
        assert_eq!(item.status, OpenItemStatus::Resolved);
        assert!(item.resolved_at.is_some());
    }

    #[test]
    fn test_thread_serde_roundtrip() {
        let thread = Thread {
            id: ulid::Ulid::new().to_string(),
            room_id: "room-1".to_string(),
            category: Category::Schedule,
            title: "Friday pickup".to_string(),
            summary: "Pickup moved to 5pm.".to_string(),
            message_count: 4,
            first_message_at: Utc::now(),
            last_message_at: Utc::now(),
            ai_confidence: 0.85,
            processing_status: ProcessingStatus::Complete,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&thread).unwrap();
        let decoded: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.category, Category::Schedule);
        assert_eq!(decoded.message_count, 4);
    }
}
