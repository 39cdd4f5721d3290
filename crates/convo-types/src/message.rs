//! Message type for the stored chat stream.
//!
//! Messages are written by the external persistence path and read here.
//! The analysis pipeline only ever mutates the `thread_id` backfill column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique identifier for a message (ULID string).
pub type MessageId = String;

/// Kind of message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Written by a room participant; eligible for analysis
    User,
    /// Produced by the system (join notices, automated notes); ignored
    System,
}

/// A chat message as stored.
///
/// Ordering key is `timestamp` (source time, not ingestion time). The
/// embedding is generated externally before topic assignment and may be
/// absent for messages that have not been embedded yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (ULID string)
    pub id: MessageId,

    /// Room this message belongs to
    pub room_id: String,

    /// Stable sender identifier
    pub sender_id: String,

    /// Display name resolved by the external profile service, if known
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Message text
    pub text: String,

    /// Source timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Author kind
    pub kind: MessageKind,

    /// Embedding vector, present once the embedding service has run
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    /// Thread this message was assigned to, if any.
    /// A message belongs to at most one thread.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl Message {
    /// Create a new user message with a fresh ULID.
    pub fn new(
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            text: text.into(),
            timestamp,
            kind: MessageKind::User,
            embedding: None,
            thread_id: None,
        }
    }

    /// Whether this message participates in windowing and analysis:
    /// user-authored with non-blank text.
    pub fn is_eligible(&self) -> bool {
        self.kind == MessageKind::User && !self.text.trim().is_empty()
    }

    /// Display name for prompts: resolved name, falling back to sender id.
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(&self.sender_id)
    }
}
