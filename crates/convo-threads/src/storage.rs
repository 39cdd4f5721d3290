//! Thread persistence on top of the shared storage layer.
//!
//! Thread creation is the pipeline's first hard transaction: the thread
//! row, the per-message thread-id backfill, and every extracted decision
//! and open item land in one write batch. A failure leaves the window's
//! messages unthreaded and eligible for the next pass.

use std::sync::Arc;

use tracing::{debug, info};

use convo_storage::{
    keys, BatchOp, MessageKey, Storage, CF_DECISIONS, CF_MESSAGES, CF_OPEN_ITEMS, CF_THREADS,
};
use convo_types::{
    Category, ConversationWindow, Decision, Message, OpenItem, ProcessingStatus, Thread,
};

use crate::analyzer::WindowAnalysis;
use crate::error::ThreadsError;

/// A thread with its extracted items, as returned by grouped listings.
#[derive(Debug, Clone)]
pub struct ThreadListing {
    pub thread: Thread,
    /// Populated only when details were requested
    pub decisions: Vec<Decision>,
    /// Populated only when details were requested
    pub open_items: Vec<OpenItem>,
}

/// Threads of one category, most recent first.
#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub category: Category,
    pub threads: Vec<ThreadListing>,
}

/// A single thread with everything attached, including the transcript.
#[derive(Debug, Clone)]
pub struct ThreadDetails {
    pub thread: Thread,
    pub decisions: Vec<Decision>,
    pub open_items: Vec<OpenItem>,
    /// The thread's messages in timestamp order
    pub messages: Vec<Message>,
}

/// Typed thread operations over the shared [`Storage`].
pub struct ThreadStorage {
    storage: Arc<Storage>,
}

impl ThreadStorage {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Persist an analyzed window as a thread, atomically.
    ///
    /// One batch writes the thread row, backfills `thread_id` onto every
    /// window message, and inserts all decisions and open items.
    pub fn create_thread(
        &self,
        window: &ConversationWindow,
        analysis: &WindowAnalysis,
    ) -> Result<Thread, ThreadsError> {
        let room_id = window
            .messages
            .first()
            .map(|m| m.room_id.clone())
            .ok_or_else(|| ThreadsError::InvalidAnalysis("empty window".to_string()))?;

        let thread = Thread {
            id: ulid::Ulid::new().to_string(),
            room_id,
            category: analysis.category,
            title: analysis.title.clone(),
            summary: analysis.summary.clone(),
            message_count: window.len(),
            first_message_at: window.first_message_at,
            last_message_at: window.last_message_at,
            ai_confidence: analysis.confidence,
            processing_status: ProcessingStatus::Complete,
            created_at: chrono::Utc::now(),
        };

        let mut ops = vec![BatchOp::put_json(
            CF_THREADS,
            keys::thread_key(&thread.id),
            &thread,
        )?];

        for message in &window.messages {
            let ulid: ulid::Ulid = message
                .id
                .parse()
                .map_err(|e| convo_storage::StorageError::Key(format!("Invalid message id: {}", e)))?;
            let key = MessageKey::from_parts(
                message.room_id.clone(),
                message.timestamp.timestamp_millis(),
                ulid,
            );
            let mut backfilled = message.clone();
            backfilled.thread_id = Some(thread.id.clone());
            ops.push(BatchOp::put_json(CF_MESSAGES, key.to_bytes(), &backfilled)?);
        }

        for draft in &analysis.decisions {
            let decision = Decision::new(
                &thread.id,
                &draft.text,
                draft.decided_by.clone(),
                draft.source_message_ids.clone(),
            );
            ops.push(BatchOp::put_json(
                CF_DECISIONS,
                keys::decision_key(&thread.id, &decision.id),
                &decision,
            )?);
        }

        for draft in &analysis.open_items {
            let item = OpenItem::new(
                &thread.id,
                &draft.text,
                draft.assigned_to.clone(),
                draft.source_message_ids.clone(),
            );
            ops.push(BatchOp::put_json(
                CF_OPEN_ITEMS,
                keys::open_item_key(&thread.id, &item.id),
                &item,
            )?);
        }

        self.storage.write_batch(ops)?;

        info!(
            thread_id = %thread.id,
            room_id = %thread.room_id,
            category = %thread.category.as_str(),
            messages = thread.message_count,
            "created thread"
        );
        Ok(thread)
    }

    /// Fetch a thread row.
    pub fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>, ThreadsError> {
        match self.storage.get(CF_THREADS, &keys::thread_key(thread_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(
                convo_storage::StorageError::from,
            )?)),
            None => Ok(None),
        }
    }

    /// All decisions for a thread.
    pub fn decisions_for(&self, thread_id: &str) -> Result<Vec<Decision>, ThreadsError> {
        let entries = self
            .storage
            .prefix_iterator(CF_DECISIONS, &keys::decision_prefix(thread_id))?;
        entries
            .into_iter()
            .map(|(_, v)| {
                serde_json::from_slice(&v)
                    .map_err(convo_storage::StorageError::from)
                    .map_err(ThreadsError::from)
            })
            .collect()
    }

    /// All open items for a thread.
    pub fn open_items_for(&self, thread_id: &str) -> Result<Vec<OpenItem>, ThreadsError> {
        let entries = self
            .storage
            .prefix_iterator(CF_OPEN_ITEMS, &keys::open_item_prefix(thread_id))?;
        entries
            .into_iter()
            .map(|(_, v)| {
                serde_json::from_slice(&v)
                    .map_err(convo_storage::StorageError::from)
                    .map_err(ThreadsError::from)
            })
            .collect()
    }

    /// Mark an open item resolved.
    pub fn resolve_open_item(&self, thread_id: &str, item_id: &str) -> Result<(), ThreadsError> {
        let key = keys::open_item_key(thread_id, item_id);
        let bytes = self
            .storage
            .get(CF_OPEN_ITEMS, &key)?
            .ok_or_else(|| ThreadsError::NotFound(format!("open item {}", item_id)))?;

        let mut item: OpenItem =
            serde_json::from_slice(&bytes).map_err(convo_storage::StorageError::from)?;
        item.resolve();

        let value = serde_json::to_vec(&item).map_err(convo_storage::StorageError::from)?;
        self.storage.put(CF_OPEN_ITEMS, &key, &value)?;
        debug!(thread_id = %thread_id, item_id = %item_id, "resolved open item");
        Ok(())
    }

    /// List a room's threads grouped by category in severity order,
    /// most recent first within each group.
    ///
    /// With `include_details`, each listing carries its decisions and
    /// open items; otherwise those vectors are empty.
    pub fn threads_by_category(
        &self,
        room_id: &str,
        limit_per_category: usize,
        include_details: bool,
    ) -> Result<Vec<CategoryGroup>, ThreadsError> {
        let entries = self.storage.prefix_iterator(CF_THREADS, b"thread:")?;
        let mut room_threads: Vec<Thread> = Vec::new();
        for (_, value) in entries {
            let thread: Thread =
                serde_json::from_slice(&value).map_err(convo_storage::StorageError::from)?;
            if thread.room_id == room_id {
                room_threads.push(thread);
            }
        }

        let mut groups = Vec::new();
        for category in Category::all() {
            let mut threads: Vec<Thread> = room_threads
                .iter()
                .filter(|t| t.category == *category)
                .cloned()
                .collect();
            if threads.is_empty() {
                continue;
            }
            threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
            threads.truncate(limit_per_category);

            let mut listings = Vec::with_capacity(threads.len());
            for thread in threads {
                let (decisions, open_items) = if include_details {
                    (
                        self.decisions_for(&thread.id)?,
                        self.open_items_for(&thread.id)?,
                    )
                } else {
                    (Vec::new(), Vec::new())
                };
                listings.push(ThreadListing {
                    thread,
                    decisions,
                    open_items,
                });
            }
            groups.push(CategoryGroup {
                category: *category,
                threads: listings,
            });
        }

        Ok(groups)
    }

    /// Fetch a thread with its decisions, open items, and full ordered
    /// transcript.
    pub fn thread_with_details(&self, thread_id: &str) -> Result<ThreadDetails, ThreadsError> {
        let thread = self
            .get_thread(thread_id)?
            .ok_or_else(|| ThreadsError::NotFound(thread_id.to_string()))?;

        let messages: Vec<Message> = self
            .storage
            .messages_in_room(&thread.room_id, None, None, None)?
            .into_iter()
            .filter(|m| m.thread_id.as_deref() == Some(thread_id))
            .collect();

        Ok(ThreadDetails {
            decisions: self.decisions_for(thread_id)?,
            open_items: self.open_items_for(thread_id)?,
            messages,
            thread,
        })
    }
}
