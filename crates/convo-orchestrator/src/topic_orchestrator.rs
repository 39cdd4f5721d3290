//! Topic lifecycle orchestration: detection, incremental assignment,
//! debounced summary regeneration, and inaccuracy reports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use convo_llm::CompletionClient;
use convo_storage::Storage;
use convo_summaries::SummaryGenerator;
use convo_topics::{assign_to_nearest, cosine_similarity, detect_candidates, TopicStorage};
use convo_types::{ClusteringConfig, DistillConfig, Message, RoomEvent, Topic};

use crate::debounce::DebounceScheduler;
use crate::error::OrchestratorError;
use crate::events::EventBus;

/// Shared-message count at which a candidate merges into an existing
/// topic instead of creating a twin.
const MERGE_MIN_OVERLAP: usize = 2;

/// Confidence penalty per inaccuracy report, and its floor.
const REPORT_PENALTY: f32 = 0.1;
const REPORT_FLOOR: f32 = 0.3;

/// Drives topic detection, assignment, and cited-summary regeneration
/// for a room.
pub struct TopicOrchestrator {
    topics: Arc<TopicStorage>,
    generator: Arc<SummaryGenerator>,
    scheduler: DebounceScheduler,
    events: EventBus,
    clustering: ClusteringConfig,
    storage: Arc<Storage>,
}

impl TopicOrchestrator {
    pub fn new(
        storage: Arc<Storage>,
        llm: Option<Arc<dyn CompletionClient>>,
        events: EventBus,
        config: &DistillConfig,
    ) -> Self {
        let topics = Arc::new(TopicStorage::new(storage.clone()));
        let generator = Arc::new(SummaryGenerator::new(
            llm,
            topics.clone(),
            config.summary.clone(),
        ));
        Self {
            topics,
            generator,
            scheduler: DebounceScheduler::new(Duration::from_millis(
                config.scheduling.regeneration_debounce_ms,
            )),
            events,
            clustering: config.clustering.clone(),
            storage,
        }
    }

    /// The topic store, shared with callers that read topics directly.
    pub fn topics(&self) -> &Arc<TopicStorage> {
        &self.topics
    }

    /// The scheduler, exposed for tests and diagnostics.
    pub fn scheduler(&self) -> &DebounceScheduler {
        &self.scheduler
    }

    /// Run density clustering over a room's recent messages and persist
    /// the resulting candidates. `since_ms` narrows the scan to newer
    /// messages. A candidate sharing enough messages with an existing
    /// topic merges into it; the rest become new topics. Returns the
    /// number of topics created.
    pub async fn detect_and_create_topics(
        self: &Arc<Self>,
        room_id: &str,
        since_ms: Option<i64>,
    ) -> Result<usize, OrchestratorError> {
        let messages = self.storage.messages_in_room(
            room_id,
            since_ms,
            None,
            Some(self.clustering.detection_limit),
        )?;
        let candidates = detect_candidates(&messages, &self.clustering);
        if candidates.is_empty() {
            debug!(room_id = %room_id, "no topic candidates detected");
            return Ok(0);
        }

        let mut created = 0;
        for candidate in &candidates {
            match self
                .topics
                .find_overlapping_topic(room_id, &candidate.message_ids, MERGE_MIN_OVERLAP)?
            {
                Some(existing) => {
                    self.merge_candidate(&existing, &candidate.message_ids, candidate.confidence)?;
                    self.queue_regeneration(&existing.id, room_id);
                }
                None => {
                    let topic = self.topics.create_topic(room_id, candidate)?;
                    self.events.publish(RoomEvent::TopicCreated {
                        room_id: room_id.to_string(),
                        topic_id: topic.id.clone(),
                    });
                    self.queue_regeneration(&topic.id, room_id);
                    created += 1;
                }
            }
        }

        info!(
            room_id = %room_id,
            candidates = candidates.len(),
            created = created,
            "topic detection complete"
        );
        Ok(created)
    }

    /// Assign a single new message to the nearest active topic, if any
    /// centroid clears the similarity threshold. Returns the topic id
    /// it joined.
    pub async fn assign_message(
        self: &Arc<Self>,
        message: &Message,
    ) -> Result<Option<String>, OrchestratorError> {
        let Some(embedding) = message.embedding.as_deref() else {
            return Ok(None);
        };

        let centroids = self.topics.active_topic_centroids(&message.room_id)?;
        let Some(topic_id) = assign_to_nearest(
            embedding,
            &centroids,
            self.clustering.similarity_threshold,
        ) else {
            return Ok(None);
        };

        let relevance = centroids
            .iter()
            .find(|(id, _)| *id == topic_id)
            .map(|(_, c)| cosine_similarity(embedding, c))
            .unwrap_or(self.clustering.similarity_threshold);

        let newly_linked = self.topics.link_message(&topic_id, &message.id, relevance)?;
        if newly_linked {
            if let Some(mut topic) = self.topics.get_topic(&topic_id)? {
                topic.message_count += 1;
                if message.timestamp > topic.last_message_at {
                    topic.last_message_at = message.timestamp;
                }
                self.topics.update_topic(&mut topic)?;
            }
            self.events.publish(RoomEvent::MessageAddedToTopic {
                room_id: message.room_id.clone(),
                topic_id: topic_id.clone(),
                message_id: message.id.clone(),
            });
            self.queue_regeneration(&topic_id, &message.room_id);
        }

        Ok(Some(topic_id))
    }

    /// Debounce a summary regeneration for a topic. Repeated triggers
    /// within the window coalesce into one regeneration.
    pub fn queue_regeneration(self: &Arc<Self>, topic_id: &str, room_id: &str) {
        let this = self.clone();
        let topic = topic_id.to_string();
        let room = room_id.to_string();
        self.scheduler.trigger(topic_id, async move {
            match this.generator.regenerate(&topic).await {
                Ok(_) => {
                    this.events.publish(RoomEvent::TopicUpdated {
                        room_id: room,
                        topic_id: topic,
                    });
                }
                Err(e) => {
                    warn!(topic_id = %topic, error = %e, "debounced regeneration failed");
                }
            }
        });
    }

    /// Handle an inaccuracy report: lower the topic's confidence, drop
    /// any pending debounced regeneration, and regenerate immediately.
    pub async fn report_inaccurate(
        &self,
        topic_id: &str,
        reported_by: &str,
        reason: Option<&str>,
    ) -> Result<Topic, OrchestratorError> {
        let mut topic = self
            .topics
            .get_topic(topic_id)?
            .ok_or_else(|| OrchestratorError::NotFound(topic_id.to_string()))?;

        topic.lower_confidence(REPORT_PENALTY, REPORT_FLOOR);
        self.topics.update_topic(&mut topic)?;
        info!(
            topic_id = %topic_id,
            reported_by = %reported_by,
            reason = reason.unwrap_or("none given"),
            confidence = topic.confidence_score,
            "summary reported inaccurate"
        );

        // The report supersedes any pending debounced pass
        self.scheduler.cancel(topic_id);
        let updated = self.generator.regenerate(topic_id).await?;
        self.events.publish(RoomEvent::TopicUpdated {
            room_id: updated.room_id.clone(),
            topic_id: updated.id.clone(),
        });
        Ok(updated)
    }

    /// Merge a re-detected candidate into the topic it overlaps: link
    /// the messages it brings and refresh the topic's counters.
    fn merge_candidate(
        &self,
        existing: &Topic,
        message_ids: &[String],
        relevance: f32,
    ) -> Result<(), OrchestratorError> {
        let mut added = 0;
        for message_id in message_ids {
            if self.topics.link_message(&existing.id, message_id, relevance)? {
                added += 1;
                self.events.publish(RoomEvent::MessageAddedToTopic {
                    room_id: existing.room_id.clone(),
                    topic_id: existing.id.clone(),
                    message_id: message_id.clone(),
                });
            }
        }

        if added > 0 {
            if let Some(mut topic) = self.topics.get_topic(&existing.id)? {
                topic.message_count = self.topics.linked_message_ids(&existing.id)?.len();
                let last = self
                    .topics
                    .linked_messages(&existing.id)?
                    .last()
                    .map(|m| m.timestamp)
                    .unwrap_or_else(Utc::now);
                if last > topic.last_message_at {
                    topic.last_message_at = last;
                }
                self.topics.update_topic(&mut topic)?;
                self.events.publish(RoomEvent::TopicUpdated {
                    room_id: existing.room_id.clone(),
                    topic_id: existing.id.clone(),
                });
            }
        }

        debug!(topic_id = %existing.id, added = added, "merged candidate into existing topic");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use convo_llm::MockClient;
    use convo_types::MessageKind;
    use tempfile::TempDir;

    fn embedded(
        storage: &Storage,
        room_id: &str,
        text: &str,
        embedding: Vec<f32>,
        offset_min: i64,
    ) -> Message {
        let mut msg = Message::new(
            room_id,
            "alice",
            text,
            Utc.timestamp_millis_opt(1_700_000_000_000 + offset_min * 60_000)
                .unwrap(),
        );
        msg.kind = MessageKind::User;
        msg.embedding = Some(embedding);
        storage.put_message(&msg).unwrap();
        msg
    }

    fn seed_soccer_cluster(storage: &Storage, room_id: &str) {
        embedded(storage, room_id, "soccer practice moved to tuesday", vec![1.0, 0.1, 0.0], 0);
        embedded(storage, room_id, "bring cleats to soccer practice", vec![0.95, 0.15, 0.0], 1);
        embedded(storage, room_id, "soccer practice starts at five", vec![0.9, 0.2, 0.0], 2);
        embedded(storage, room_id, "who is driving to soccer practice", vec![0.92, 0.12, 0.0], 3);
    }

    fn setup() -> (TempDir, Arc<Storage>, Arc<TopicOrchestrator>) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let orchestrator = Arc::new(TopicOrchestrator::new(
            storage.clone(),
            None,
            EventBus::new(),
            &DistillConfig::default(),
        ));
        (dir, storage, orchestrator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_creates_topic_once() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");

        assert_eq!(
            orchestrator.detect_and_create_topics("room-1", None).await.unwrap(),
            1
        );
        let topics = orchestrator.topics().topics_for_room("room-1", false, None).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].message_count, 4);
        assert_eq!(topics[0].summary_version, 1);

        // Re-detecting the same cluster merges instead of duplicating
        assert_eq!(
            orchestrator.detect_and_create_topics("room-1", None).await.unwrap(),
            0
        );
        assert_eq!(
            orchestrator.topics().topics_for_room("room-1", false, None).unwrap().len(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_since_excludes_older_messages() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");

        // A cutoff past the seeded cluster leaves too few messages to cluster
        let cutoff = 1_700_000_000_000 + 2 * 60_000;
        assert_eq!(
            orchestrator
                .detect_and_create_topics("room-1", Some(cutoff))
                .await
                .unwrap(),
            0
        );
        assert!(orchestrator
            .topics()
            .topics_for_room("room-1", false, None)
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_publishes_created_event() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");
        let mut rx = orchestrator.events.subscribe();

        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();

        match rx.recv().await.unwrap() {
            RoomEvent::TopicCreated { room_id, .. } => assert_eq!(room_id, "room-1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_assign_message_links_to_nearest_topic() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");
        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();
        let topic = orchestrator.topics().topics_for_room("room-1", false, None).unwrap()
            .remove(0);

        let msg = embedded(
            &storage,
            "room-1",
            "soccer game rescheduled again",
            vec![0.97, 0.1, 0.0],
            10,
        );
        let assigned = orchestrator.assign_message(&msg).await.unwrap();
        assert_eq!(assigned.as_deref(), Some(topic.id.as_str()));

        let refreshed = orchestrator.topics().get_topic(&topic.id).unwrap().unwrap();
        assert_eq!(refreshed.message_count, 5);
        assert!(refreshed.last_message_at >= msg.timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assign_message_below_threshold_does_nothing() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");
        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();

        let msg = embedded(&storage, "room-1", "completely unrelated", vec![0.0, 0.0, 1.0], 10);
        assert!(orchestrator.assign_message(&msg).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_regeneration_replaces_placeholder() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");
        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();
        let topic = orchestrator.topics().topics_for_room("room-1", false, None).unwrap()
            .remove(0);
        assert!(orchestrator.scheduler().is_pending(&topic.id));

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        let refreshed = orchestrator.topics().get_topic(&topic.id).unwrap().unwrap();
        assert_eq!(refreshed.summary_version, 2);
        // Fallback summary cites the earliest message
        let citations = orchestrator.topics().citations_for(&topic.id).unwrap();
        assert_eq!(citations.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_inaccurate_lowers_confidence_and_regenerates() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let llm = Arc::new(MockClient::new(
            r#"{"summary": "They talked about soccer.", "citations": []}"#,
        ));
        let orchestrator = Arc::new(TopicOrchestrator::new(
            storage.clone(),
            Some(llm),
            EventBus::new(),
            &DistillConfig::default(),
        ));
        seed_soccer_cluster(&storage, "room-1");
        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();
        let topic = orchestrator.topics().topics_for_room("room-1", false, None).unwrap()
            .remove(0);
        let before = topic.confidence_score;

        let updated = orchestrator
            .report_inaccurate(&topic.id, "bob", Some("wrong day"))
            .await
            .unwrap();

        assert!((updated.confidence_score - (before - 0.1).max(0.3)).abs() < 1e-6);
        assert_eq!(updated.summary_version, 2);
        assert_eq!(updated.summary_text, "They talked about soccer.");
        // The pending debounced pass was cancelled by the report
        assert!(!orchestrator.scheduler().is_pending(&topic.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_inaccurate_unknown_topic() {
        let (_dir, _storage, orchestrator) = setup();
        let err = orchestrator
            .report_inaccurate("nope", "bob", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confidence_floor_holds_under_repeated_reports() {
        let (_dir, storage, orchestrator) = setup();
        seed_soccer_cluster(&storage, "room-1");
        orchestrator.detect_and_create_topics("room-1", None).await.unwrap();
        let topic = orchestrator.topics().topics_for_room("room-1", false, None).unwrap()
            .remove(0);

        for _ in 0..10 {
            orchestrator
                .report_inaccurate(&topic.id, "bob", None)
                .await
                .unwrap();
        }
        let refreshed = orchestrator.topics().get_topic(&topic.id).unwrap().unwrap();
        assert!((refreshed.confidence_score - 0.3).abs() < 1e-6);
    }
}
