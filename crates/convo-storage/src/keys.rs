//! Key encoding and decoding for the storage layer.
//!
//! Message key format: `msg:{room_id}:{timestamp_ms}:{ulid}`
//! - timestamp_ms: milliseconds since Unix epoch, zero-padded to 13 digits
//! - ulid: 26-character ULID for uniqueness within the same millisecond
//!
//! Zero-padding makes lexicographic order equal chronological order, so a
//! room's messages can be scanned in time order via prefix iteration.
//! Secondary records use simpler `{prefix}:{owner}:{suffix}` keys that group
//! children under their parent for the same reason.

use ulid::Ulid;

use crate::error::StorageError;

/// Primary key for a stored message.
/// Format: `msg:{room_id}:{timestamp_ms:013}:{ulid}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKey {
    /// Room the message belongs to
    pub room_id: String,
    /// Source timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Unique identifier (also serves as message id)
    pub ulid: Ulid,
}

impl MessageKey {
    /// Create a key from existing parts.
    pub fn from_parts(room_id: impl Into<String>, timestamp_ms: i64, ulid: Ulid) -> Self {
        Self {
            room_id: room_id.into(),
            timestamp_ms,
            ulid,
        }
    }

    /// Encode key to bytes for storage.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("msg:{}:{:013}:{}", self.room_id, self.timestamp_ms, self.ulid).into_bytes()
    }

    /// Decode key from bytes.
    ///
    /// Room ids may themselves contain `:`, so the timestamp and ULID are
    /// taken from the right.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let rest = s
            .strip_prefix("msg:")
            .ok_or_else(|| StorageError::Key(format!("Invalid message key format: {}", s)))?;

        let mut parts = rest.rsplitn(3, ':');
        let (ulid_part, ts_part, room_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(t), Some(r)) => (u, t, r),
            _ => return Err(StorageError::Key(format!("Invalid message key format: {}", s))),
        };

        let timestamp_ms: i64 = ts_part
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid timestamp: {}", e)))?;
        let ulid: Ulid = ulid_part
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid ULID: {}", e)))?;

        Ok(Self {
            room_id: room_part.to_string(),
            timestamp_ms,
            ulid,
        })
    }

    /// The message id (ULID string) for this key.
    pub fn message_id(&self) -> String {
        self.ulid.to_string()
    }

    /// Prefix that selects all messages in a room, in time order.
    pub fn room_prefix(room_id: &str) -> Vec<u8> {
        format!("msg:{}:", room_id).into_bytes()
    }

    /// Prefix that selects a room's messages from `since_ms` onward.
    pub fn room_from(room_id: &str, since_ms: i64) -> Vec<u8> {
        format!("msg:{}:{:013}", room_id, since_ms).into_bytes()
    }
}

/// Key for the message id index: `id:{message_id}` -> primary message key.
pub fn message_index_key(message_id: &str) -> Vec<u8> {
    format!("id:{}", message_id).into_bytes()
}

/// Key for a thread record: `thread:{thread_id}`.
pub fn thread_key(thread_id: &str) -> Vec<u8> {
    format!("thread:{}", thread_id).into_bytes()
}

/// Key for a decision under its thread: `dec:{thread_id}:{decision_id}`.
pub fn decision_key(thread_id: &str, decision_id: &str) -> Vec<u8> {
    format!("dec:{}:{}", thread_id, decision_id).into_bytes()
}

/// Prefix selecting all decisions for a thread.
pub fn decision_prefix(thread_id: &str) -> Vec<u8> {
    format!("dec:{}:", thread_id).into_bytes()
}

/// Key for an open item under its thread: `open:{thread_id}:{item_id}`.
pub fn open_item_key(thread_id: &str, item_id: &str) -> Vec<u8> {
    format!("open:{}:{}", thread_id, item_id).into_bytes()
}

/// Prefix selecting all open items for a thread.
pub fn open_item_prefix(thread_id: &str) -> Vec<u8> {
    format!("open:{}:", thread_id).into_bytes()
}

/// Key for a topic record: `topic:{topic_id}`.
pub fn topic_key(topic_id: &str) -> Vec<u8> {
    format!("topic:{}", topic_id).into_bytes()
}

/// Key for a topic-message link: `tm:{topic_id}:{message_id}`.
///
/// Keying by the pair makes link writes idempotent: re-adding a message to
/// a topic overwrites the same row.
pub fn topic_message_key(topic_id: &str, message_id: &str) -> Vec<u8> {
    format!("tm:{}:{}", topic_id, message_id).into_bytes()
}

/// Prefix selecting all message links for a topic.
pub fn topic_message_prefix(topic_id: &str) -> Vec<u8> {
    format!("tm:{}:", topic_id).into_bytes()
}

/// Key for a citation: `cite:{topic_id}:{start_index:05}:{citation_id}`.
///
/// The padded start index keeps citations in summary order under the scan.
pub fn citation_key(topic_id: &str, start_index: usize, citation_id: &str) -> Vec<u8> {
    format!("cite:{}:{:05}:{}", topic_id, start_index, citation_id).into_bytes()
}

/// Prefix selecting all citations for a topic's current summary.
pub fn citation_prefix(topic_id: &str) -> Vec<u8> {
    format!("cite:{}:", topic_id).into_bytes()
}

/// Key for an archived summary version: `hist:{topic_id}:{version:05}`.
pub fn history_key(topic_id: &str, version: u32) -> Vec<u8> {
    format!("hist:{}:{:05}", topic_id, version).into_bytes()
}

/// Prefix selecting a topic's summary history, oldest version first.
pub fn history_prefix(topic_id: &str) -> Vec<u8> {
    format!("hist:{}:", topic_id).into_bytes()
}
