//! Topic, topic-message link, citation, and summary history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::message::MessageId;

/// A semantically clustered set of messages with a cited summary.
///
/// Topics are archived (soft-deleted), never physically removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Unique identifier (ULID string)
    pub id: String,
    /// Room the topic belongs to
    pub room_id: String,
    /// Short title derived from the cluster content
    pub title: String,
    /// Inferred category
    pub category: Category,
    /// Current summary text
    pub summary_text: String,
    /// Monotonic summary version, starts at 1
    pub summary_version: u32,
    /// Cluster confidence in [0, 1]; lowered by inaccuracy reports,
    /// floored at 0.3
    pub confidence_score: f32,
    /// Soft-delete flag; archived topics are excluded from default listings
    /// and from centroid assignment
    pub archived: bool,
    /// Number of linked messages
    pub message_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub first_message_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_message_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    /// Lower the confidence score by `delta`, floored at `floor`.
    pub fn lower_confidence(&mut self, delta: f32, floor: f32) {
        self.confidence_score = (self.confidence_score - delta).max(floor);
    }
}

/// Association between a topic and a message.
///
/// A message may belong to multiple topics over time but is linked to a
/// given topic at most once; re-adding updates the relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic_id: String,
    pub message_id: MessageId,
    /// How relevant the message is to the topic (0.0 - 1.0)
    pub relevance_score: f32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}

impl TopicMessage {
    pub fn new(
        topic_id: impl Into<String>,
        message_id: impl Into<String>,
        relevance_score: f32,
    ) -> Self {
        Self {
            topic_id: topic_id.into(),
            message_id: message_id.into(),
            relevance_score: relevance_score.clamp(0.0, 1.0),
            added_at: Utc::now(),
        }
    }
}

/// A claim-to-source mapping within a topic summary.
///
/// `start_index..end_index` is a span into the summary text. The message
/// ids are always a subset of the topic's linked messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Unique identifier (ULID string)
    pub id: String,
    /// Owning summary (= topic id)
    pub summary_id: String,
    /// The factual claim being cited
    pub claim_text: String,
    /// Span start in the summary text (byte index)
    pub start_index: usize,
    /// Span end in the summary text (byte index, exclusive)
    pub end_index: usize,
    /// Source messages substantiating the claim
    pub message_ids: Vec<MessageId>,
}

impl Citation {
    pub fn new(
        summary_id: impl Into<String>,
        claim_text: impl Into<String>,
        start_index: usize,
        end_index: usize,
        message_ids: Vec<MessageId>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            summary_id: summary_id.into(),
            claim_text: claim_text.into(),
            start_index,
            end_index,
            message_ids,
        }
    }
}

/// Append-only snapshot of a summary version, captured immediately before
/// each regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySnapshot {
    /// Topic whose summary was archived
    pub topic_id: String,
    /// Version being archived
    pub version: u32,
    /// Summary text as it stood
    pub summary_text: String,
    /// Citations as they stood
    pub citations: Vec<Citation>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub archived_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_topic() -> Topic {
        let now = Utc::now();
        Topic {
            id: ulid::Ulid::new().to_string(),
            room_id: "room-1".to_string(),
            title: "Soccer & Practice & Carpool".to_string(),
            category: Category::Activities,
            summary_text: "Discussion about soccer with 5 messages.".to_string(),
            summary_version: 1,
            confidence_score: 0.8,
            archived: false,
            message_count: 5,
            first_message_at: now,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lower_confidence_floors() {
        let mut topic = test_topic();
        topic.confidence_score = 0.35;

        topic.lower_confidence(0.1, 0.3);
        assert!((topic.confidence_score - 0.3).abs() < f32::EPSILON);

        topic.lower_confidence(0.1, 0.3);
        assert!((topic.confidence_score - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_topic_message_relevance_clamped() {
        let link = TopicMessage::new("t1", "m1", 1.8);
        assert!((link.relevance_score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_snapshot_serde() {
        let snapshot = SummarySnapshot {
            topic_id: "t1".to_string(),
            version: 3,
            summary_text: "Fee is $50, due Jan 25".to_string(),
            citations: vec![Citation::new("t1", "$50", 7, 10, vec!["m1".to_string()])],
            archived_at: Utc::now(),
        };
        let json = serde_json::to_vec(&snapshot).unwrap();
        let decoded: SummarySnapshot = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded.version, 3);
        assert_eq!(decoded.citations.len(), 1);
        assert_eq!(decoded.citations[0].start_index, 7);
    }
}
