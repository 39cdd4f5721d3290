//! Topic persistence: topic rows, message links, citations, and summary
//! history.
//!
//! Summary regeneration is the pipeline's second hard transaction: the
//! outgoing (text, citations) pair is snapshotted into history, the topic
//! row is rewritten with the incremented version, and the citation rows
//! are replaced wholesale, all in one write batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use convo_storage::{
    keys, BatchOp, Storage, CF_CITATIONS, CF_SUMMARY_HISTORY, CF_TOPICS, CF_TOPIC_MESSAGES,
};
use convo_types::{Citation, Message, SummarySnapshot, Topic, TopicMessage};

use crate::clusterer::TopicCandidate;
use crate::error::TopicsError;
use crate::similarity::centroid;

/// A topic with its citations and linked messages.
#[derive(Debug, Clone)]
pub struct TopicWithCitations {
    pub topic: Topic,
    /// Ordered by start index into the summary text
    pub citations: Vec<Citation>,
    /// Linked messages in timestamp order
    pub messages: Vec<Message>,
}

/// Typed topic operations over the shared [`Storage`].
pub struct TopicStorage {
    storage: Arc<Storage>,
}

impl TopicStorage {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Persist a detected candidate as a new topic and link all its
    /// messages. The initial summary is a placeholder at version 1;
    /// regeneration replaces it.
    pub fn create_topic(
        &self,
        room_id: &str,
        candidate: &TopicCandidate,
    ) -> Result<Topic, TopicsError> {
        let now = Utc::now();
        let topic = Topic {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.to_string(),
            title: candidate.title.clone(),
            category: candidate.category,
            summary_text: format!(
                "Discussion about {} with {} messages.",
                candidate.title,
                candidate.message_ids.len()
            ),
            summary_version: 1,
            confidence_score: candidate.confidence.clamp(0.0, 1.0),
            archived: false,
            message_count: candidate.message_ids.len(),
            first_message_at: candidate.first_message_at,
            last_message_at: candidate.last_message_at,
            created_at: now,
            updated_at: now,
        };

        let mut ops = vec![BatchOp::put_json(
            CF_TOPICS,
            keys::topic_key(&topic.id),
            &topic,
        )?];
        for message_id in &candidate.message_ids {
            let link = TopicMessage::new(&topic.id, message_id, candidate.confidence);
            ops.push(BatchOp::put_json(
                CF_TOPIC_MESSAGES,
                keys::topic_message_key(&topic.id, message_id),
                &link,
            )?);
        }
        self.storage.write_batch(ops)?;

        info!(
            topic_id = %topic.id,
            room_id = %room_id,
            title = %topic.title,
            messages = topic.message_count,
            "created topic"
        );
        Ok(topic)
    }

    /// Fetch a topic row.
    pub fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, TopicsError> {
        match self.storage.get(CF_TOPICS, &keys::topic_key(topic_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(
                convo_storage::StorageError::from,
            )?)),
            None => Ok(None),
        }
    }

    /// Overwrite a topic row, stamping `updated_at`.
    pub fn update_topic(&self, topic: &mut Topic) -> Result<(), TopicsError> {
        topic.updated_at = Utc::now();
        let value = serde_json::to_vec(topic).map_err(convo_storage::StorageError::from)?;
        self.storage.put(CF_TOPICS, &keys::topic_key(&topic.id), &value)?;
        Ok(())
    }

    /// Soft-delete a topic. Archived topics stay readable but drop out
    /// of default listings and centroid assignment.
    pub fn archive_topic(&self, topic_id: &str) -> Result<(), TopicsError> {
        let mut topic = self
            .get_topic(topic_id)?
            .ok_or_else(|| TopicsError::NotFound(topic_id.to_string()))?;
        topic.archived = true;
        self.update_topic(&mut topic)?;
        info!(topic_id = %topic_id, "archived topic");
        Ok(())
    }

    /// List a room's topics, most recently updated first.
    pub fn topics_for_room(
        &self,
        room_id: &str,
        include_archived: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Topic>, TopicsError> {
        let entries = self.storage.prefix_iterator(CF_TOPICS, b"topic:")?;
        let mut topics = Vec::new();
        for (_, value) in entries {
            let topic: Topic =
                serde_json::from_slice(&value).map_err(convo_storage::StorageError::from)?;
            if topic.room_id == room_id && (include_archived || !topic.archived) {
                topics.push(topic);
            }
        }

        topics.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            topics.truncate(limit);
        }
        Ok(topics)
    }

    /// Link a message to a topic. Idempotent: re-linking updates the
    /// relevance score of the existing row and reports `false`.
    pub fn link_message(
        &self,
        topic_id: &str,
        message_id: &str,
        relevance_score: f32,
    ) -> Result<bool, TopicsError> {
        let key = keys::topic_message_key(topic_id, message_id);
        match self.storage.get(CF_TOPIC_MESSAGES, &key)? {
            Some(bytes) => {
                let mut link: TopicMessage =
                    serde_json::from_slice(&bytes).map_err(convo_storage::StorageError::from)?;
                link.relevance_score = relevance_score.clamp(0.0, 1.0);
                let value =
                    serde_json::to_vec(&link).map_err(convo_storage::StorageError::from)?;
                self.storage.put(CF_TOPIC_MESSAGES, &key, &value)?;
                Ok(false)
            }
            None => {
                let link = TopicMessage::new(topic_id, message_id, relevance_score);
                let value =
                    serde_json::to_vec(&link).map_err(convo_storage::StorageError::from)?;
                self.storage.put(CF_TOPIC_MESSAGES, &key, &value)?;
                debug!(topic_id = %topic_id, message_id = %message_id, "linked message to topic");
                Ok(true)
            }
        }
    }

    /// Ids of all messages linked to a topic.
    pub fn linked_message_ids(&self, topic_id: &str) -> Result<Vec<String>, TopicsError> {
        let entries = self
            .storage
            .prefix_iterator(CF_TOPIC_MESSAGES, &keys::topic_message_prefix(topic_id))?;
        entries
            .into_iter()
            .map(|(_, v)| {
                let link: TopicMessage =
                    serde_json::from_slice(&v).map_err(convo_storage::StorageError::from)?;
                Ok(link.message_id)
            })
            .collect()
    }

    /// All messages linked to a topic, in timestamp order. Links whose
    /// message no longer resolves are skipped.
    pub fn linked_messages(&self, topic_id: &str) -> Result<Vec<Message>, TopicsError> {
        let mut messages = Vec::new();
        for message_id in self.linked_message_ids(topic_id)? {
            if let Some(message) = self.storage.get_message(&message_id)? {
                messages.push(message);
            }
        }
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    /// Find a room's non-archived topic sharing at least `min_overlap`
    /// messages with the candidate ids, if any.
    ///
    /// This is the duplicate guard: re-detecting an unchanged cluster
    /// merges into the topic it produced last time instead of creating
    /// a twin.
    pub fn find_overlapping_topic(
        &self,
        room_id: &str,
        candidate_ids: &[String],
        min_overlap: usize,
    ) -> Result<Option<Topic>, TopicsError> {
        let candidate_set: HashSet<&str> = candidate_ids.iter().map(String::as_str).collect();

        for topic in self.topics_for_room(room_id, false, None)? {
            let overlap = self
                .linked_message_ids(&topic.id)?
                .iter()
                .filter(|id| candidate_set.contains(id.as_str()))
                .count();
            if overlap >= min_overlap {
                return Ok(Some(topic));
            }
        }
        Ok(None)
    }

    /// Embedding centroids of a room's non-archived topics, keyed by
    /// topic id. Topics with no embedded messages are omitted.
    pub fn active_topic_centroids(
        &self,
        room_id: &str,
    ) -> Result<Vec<(String, Vec<f32>)>, TopicsError> {
        let mut centroids = Vec::new();
        for topic in self.topics_for_room(room_id, false, None)? {
            let messages = self.linked_messages(&topic.id)?;
            let embeddings: Vec<&[f32]> = messages
                .iter()
                .filter_map(|m| m.embedding.as_deref())
                .collect();
            if let Some(c) = centroid(&embeddings) {
                centroids.push((topic.id, c));
            }
        }
        Ok(centroids)
    }

    /// Citations for a topic's current summary, ordered by start index.
    pub fn citations_for(&self, topic_id: &str) -> Result<Vec<Citation>, TopicsError> {
        let entries = self
            .storage
            .prefix_iterator(CF_CITATIONS, &keys::citation_prefix(topic_id))?;
        entries
            .into_iter()
            .map(|(_, v)| {
                serde_json::from_slice(&v)
                    .map_err(convo_storage::StorageError::from)
                    .map_err(TopicsError::from)
            })
            .collect()
    }

    /// Archived summary versions, oldest first.
    pub fn history_for(&self, topic_id: &str) -> Result<Vec<SummarySnapshot>, TopicsError> {
        let entries = self
            .storage
            .prefix_iterator(CF_SUMMARY_HISTORY, &keys::history_prefix(topic_id))?;
        entries
            .into_iter()
            .map(|(_, v)| {
                serde_json::from_slice(&v)
                    .map_err(convo_storage::StorageError::from)
                    .map_err(TopicsError::from)
            })
            .collect()
    }

    /// Fetch a topic with its citations and linked messages.
    pub fn topic_with_citations(&self, topic_id: &str) -> Result<TopicWithCitations, TopicsError> {
        let topic = self
            .get_topic(topic_id)?
            .ok_or_else(|| TopicsError::NotFound(topic_id.to_string()))?;

        Ok(TopicWithCitations {
            citations: self.citations_for(topic_id)?,
            messages: self.linked_messages(topic_id)?,
            topic,
        })
    }

    /// Apply a regenerated summary atomically.
    ///
    /// One batch: snapshot the current (text, citations) into history
    /// under the current version, bump the version and replace the
    /// summary text on the topic row, delete every existing citation
    /// row, and insert the new ones. Returns the updated topic.
    pub fn apply_regeneration(
        &self,
        topic_id: &str,
        new_summary: &str,
        new_citations: &[Citation],
    ) -> Result<Topic, TopicsError> {
        let mut topic = self
            .get_topic(topic_id)?
            .ok_or_else(|| TopicsError::NotFound(topic_id.to_string()))?;

        let old_citations = self.citations_for(topic_id)?;
        let snapshot = SummarySnapshot {
            topic_id: topic.id.clone(),
            version: topic.summary_version,
            summary_text: topic.summary_text.clone(),
            citations: old_citations.clone(),
            archived_at: Utc::now(),
        };

        let old_version = topic.summary_version;
        topic.summary_version += 1;
        topic.summary_text = new_summary.to_string();
        topic.updated_at = Utc::now();

        let mut ops = vec![
            BatchOp::put_json(
                CF_SUMMARY_HISTORY,
                keys::history_key(topic_id, snapshot.version),
                &snapshot,
            )?,
            BatchOp::put_json(CF_TOPICS, keys::topic_key(topic_id), &topic)?,
        ];
        for citation in &old_citations {
            ops.push(BatchOp::Delete {
                cf: CF_CITATIONS,
                key: keys::citation_key(topic_id, citation.start_index, &citation.id),
            });
        }
        for citation in new_citations {
            ops.push(BatchOp::put_json(
                CF_CITATIONS,
                keys::citation_key(topic_id, citation.start_index, &citation.id),
                citation,
            )?);
        }
        self.storage.write_batch(ops)?;

        info!(
            topic_id = %topic_id,
            version = topic.summary_version,
            previous_version = old_version,
            citations = new_citations.len(),
            "applied regenerated summary"
        );
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use convo_types::Category;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<Storage>, TopicStorage) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let topics = TopicStorage::new(storage.clone());
        (dir, storage, topics)
    }

    fn stored_messages(storage: &Storage, room_id: &str, count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                let mut msg = Message::new(
                    room_id,
                    "alice",
                    format!("soccer practice message {}", i),
                    Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64 * 60_000)
                        .unwrap(),
                );
                msg.embedding = Some(vec![1.0, i as f32 * 0.01]);
                storage.put_message(&msg).unwrap();
                msg
            })
            .collect()
    }

    fn candidate_from(messages: &[Message]) -> TopicCandidate {
        TopicCandidate {
            messages: messages.to_vec(),
            message_ids: messages.iter().map(|m| m.id.clone()).collect(),
            title: "Soccer & Practice".to_string(),
            category: Category::Activities,
            confidence: 0.9,
            first_message_at: messages.first().unwrap().timestamp,
            last_message_at: messages.last().unwrap().timestamp,
        }
    }

    #[test]
    fn test_create_topic_links_and_placeholder_summary() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        assert_eq!(topic.summary_version, 1);
        assert_eq!(
            topic.summary_text,
            "Discussion about Soccer & Practice with 3 messages."
        );
        assert_eq!(topics.linked_message_ids(&topic.id).unwrap().len(), 3);
        assert_eq!(topics.linked_messages(&topic.id).unwrap()[0].id, messages[0].id);
    }

    #[test]
    fn test_create_topic_clamps_confidence() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);

        let mut candidate = candidate_from(&messages);
        candidate.confidence = -0.2;
        let low = topics.create_topic("room-1", &candidate).unwrap();
        assert_eq!(low.confidence_score, 0.0);

        candidate.confidence = 1.4;
        let high = topics.create_topic("room-1", &candidate).unwrap();
        assert_eq!(high.confidence_score, 1.0);
    }

    #[test]
    fn test_link_message_idempotent() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        let extra = stored_messages(&storage, "room-1", 1);
        assert!(topics.link_message(&topic.id, &extra[0].id, 0.8).unwrap());
        assert!(!topics.link_message(&topic.id, &extra[0].id, 0.6).unwrap());
        assert_eq!(topics.linked_message_ids(&topic.id).unwrap().len(), 4);
    }

    #[test]
    fn test_topics_for_room_excludes_archived() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let kept = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();
        let archived = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();
        topics.archive_topic(&archived.id).unwrap();

        let listed = topics.topics_for_room("room-1", false, None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);

        let all = topics.topics_for_room("room-1", true, None).unwrap();
        assert_eq!(all.len(), 2);
        // Most recently updated first: archiving touched updated_at
        assert_eq!(all[0].id, archived.id);
    }

    #[test]
    fn test_find_overlapping_topic() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 4);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages[..3]))
            .unwrap();

        // Shares 2 of 3 ids with the existing topic
        let overlapping = vec![
            messages[1].id.clone(),
            messages[2].id.clone(),
            messages[3].id.clone(),
        ];
        let found = topics
            .find_overlapping_topic("room-1", &overlapping, 2)
            .unwrap();
        assert_eq!(found.unwrap().id, topic.id);

        // Only 1 shared id is not enough
        let disjoint = vec![messages[2].id.clone(), "01HUNKNOWN".to_string()];
        assert!(topics
            .find_overlapping_topic("room-1", &disjoint, 2)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_active_topic_centroids_skip_archived() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        let centroids = topics.active_topic_centroids("room-1").unwrap();
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].0, topic.id);
        assert_eq!(centroids[0].1.len(), 2);

        topics.archive_topic(&topic.id).unwrap();
        assert!(topics.active_topic_centroids("room-1").unwrap().is_empty());
    }

    #[test]
    fn test_apply_regeneration_versions_and_history() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();
        let original_text = topic.summary_text.clone();

        let citations = vec![Citation::new(
            &topic.id,
            "practice",
            7,
            15,
            vec![messages[0].id.clone()],
        )];
        let updated = topics
            .apply_regeneration(&topic.id, "Practice is on Tuesdays now.", &citations)
            .unwrap();

        assert_eq!(updated.summary_version, 2);
        assert_eq!(updated.summary_text, "Practice is on Tuesdays now.");

        let history = topics.history_for(&topic.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[0].summary_text, original_text);
        assert!(history[0].citations.is_empty());

        let stored = topics.citations_for(&topic.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].claim_text, "practice");
    }

    #[test]
    fn test_apply_regeneration_replaces_citations_wholesale() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        let first = vec![
            Citation::new(&topic.id, "one", 0, 3, vec![messages[0].id.clone()]),
            Citation::new(&topic.id, "two", 4, 7, vec![messages[1].id.clone()]),
        ];
        topics.apply_regeneration(&topic.id, "one two", &first).unwrap();

        let second = vec![Citation::new(
            &topic.id,
            "three",
            0,
            5,
            vec![messages[2].id.clone()],
        )];
        topics.apply_regeneration(&topic.id, "three", &second).unwrap();

        // No stale rows from the first generation survive
        let stored = topics.citations_for(&topic.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].claim_text, "three");

        let history = topics.history_for(&topic.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].citations.len(), 2);
    }

    #[test]
    fn test_citations_ordered_by_start_index() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        let citations = vec![
            Citation::new(&topic.id, "late", 120, 124, vec![messages[0].id.clone()]),
            Citation::new(&topic.id, "early", 3, 8, vec![messages[1].id.clone()]),
        ];
        topics
            .apply_regeneration(&topic.id, "x".repeat(130).as_str(), &citations)
            .unwrap();

        let stored = topics.citations_for(&topic.id).unwrap();
        assert_eq!(stored[0].claim_text, "early");
        assert_eq!(stored[1].claim_text, "late");
    }

    #[test]
    fn test_topic_with_citations() {
        let (_dir, storage, topics) = setup();
        let messages = stored_messages(&storage, "room-1", 3);
        let topic = topics
            .create_topic("room-1", &candidate_from(&messages))
            .unwrap();

        let view = topics.topic_with_citations(&topic.id).unwrap();
        assert_eq!(view.topic.id, topic.id);
        assert_eq!(view.messages.len(), 3);
        assert!(view.citations.is_empty());

        assert!(matches!(
            topics.topic_with_citations("missing"),
            Err(TopicsError::NotFound(_))
        ));
    }
}
