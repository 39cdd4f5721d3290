//! RocksDB wrapper for the conversation distillation store.
//!
//! Provides:
//! - Database open with column family setup
//! - Message stream reads (time-ordered room scans, id lookup, context)
//! - Generic column family operations for the thread and topic crates
//! - Multi-column-family atomic write batches

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info};

use convo_types::Message;

use crate::column_families::{build_cf_descriptors, CF_MESSAGES, CF_MESSAGE_INDEX};
use crate::error::StorageError;
use crate::keys::{message_index_key, MessageKey};

/// A single operation inside an atomic write batch.
///
/// Batches may span column families; RocksDB applies the whole batch or
/// none of it.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        cf: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: &'static str,
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Serialize `value` as JSON into a put operation.
    pub fn put_json<T: serde::Serialize>(
        cf: &'static str,
        key: Vec<u8>,
        value: &T,
    ) -> Result<Self, StorageError> {
        Ok(BatchOp::Put {
            cf,
            key,
            value: serde_json::to_vec(value)?,
        })
    }
}

/// Main storage interface for the distillation subsystem.
///
/// One RocksDB instance holds every room; all records are JSON values under
/// string keys (see [`crate::keys`]).
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        // Universal compaction for the append-heavy message stream
        db_opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    // ===== Message Stream Operations =====

    /// Store a message under its room/time primary key plus an id index
    /// entry, atomically.
    ///
    /// Returns false if a message with this id already exists (idempotent).
    pub fn put_message(&self, message: &Message) -> Result<bool, StorageError> {
        let messages_cf = self.cf(CF_MESSAGES)?;
        let index_cf = self.cf(CF_MESSAGE_INDEX)?;

        let index_key = message_index_key(&message.id);
        if self.db.get_cf(&index_cf, &index_key)?.is_some() {
            debug!(message_id = %message.id, "message already stored, skipping");
            return Ok(false);
        }

        let ulid: ulid::Ulid = message
            .id
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid message id ULID: {}", e)))?;
        let key = MessageKey::from_parts(
            message.room_id.clone(),
            message.timestamp.timestamp_millis(),
            ulid,
        );

        let mut batch = WriteBatch::default();
        batch.put_cf(&messages_cf, key.to_bytes(), serde_json::to_vec(message)?);
        batch.put_cf(&index_cf, &index_key, key.to_bytes());
        self.db.write(batch)?;

        debug!(message_id = %message.id, room_id = %message.room_id, "stored message");
        Ok(true)
    }

    /// Look up a message by id, returning its primary key alongside it.
    pub fn message_entry(
        &self,
        message_id: &str,
    ) -> Result<Option<(MessageKey, Message)>, StorageError> {
        let index_cf = self.cf(CF_MESSAGE_INDEX)?;
        let primary = match self.db.get_cf(&index_cf, message_index_key(message_id))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let messages_cf = self.cf(CF_MESSAGES)?;
        let value = self
            .db
            .get_cf(&messages_cf, &primary)?
            .ok_or_else(|| StorageError::NotFound(format!("message {}", message_id)))?;

        let key = MessageKey::from_bytes(&primary)?;
        let message: Message = serde_json::from_slice(&value)?;
        Ok(Some((key, message)))
    }

    /// Look up a message by id.
    pub fn get_message(&self, message_id: &str) -> Result<Option<Message>, StorageError> {
        Ok(self.message_entry(message_id)?.map(|(_, m)| m))
    }

    /// Fetch a room's messages in chronological order.
    ///
    /// `since_ms`/`until_ms` bound the scan by source time (both
    /// inclusive); `limit` caps the number returned.
    pub fn messages_in_room(
        &self,
        room_id: &str,
        since_ms: Option<i64>,
        until_ms: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StorageError> {
        let messages_cf = self.cf(CF_MESSAGES)?;
        let room_prefix = MessageKey::room_prefix(room_id);
        let start = match since_ms {
            Some(ms) => MessageKey::room_from(room_id, ms),
            None => room_prefix.clone(),
        };
        // Inclusive upper bound: stop before the first key past until_ms
        let end = until_ms.map(|ms| MessageKey::room_from(room_id, ms.saturating_add(1)));

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(&messages_cf, IteratorMode::From(&start, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&room_prefix) {
                break;
            }
            if end.as_ref().is_some_and(|e| key.as_ref() >= e.as_slice()) {
                break;
            }
            results.push(serde_json::from_slice(&value)?);
            if limit.is_some_and(|n| results.len() >= n) {
                break;
            }
        }

        Ok(results)
    }

    /// Fetch a room's messages that have not been assigned to any thread,
    /// oldest first, up to `limit`.
    pub fn unthreaded_messages(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let messages_cf = self.cf(CF_MESSAGES)?;
        let room_prefix = MessageKey::room_prefix(room_id);

        let mut results = Vec::new();
        let iter = self.db.iterator_cf(
            &messages_cf,
            IteratorMode::From(&room_prefix, Direction::Forward),
        );

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&room_prefix) {
                break;
            }
            let message: Message = serde_json::from_slice(&value)?;
            if message.thread_id.is_none() {
                results.push(message);
                if results.len() >= limit {
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Fetch the messages surrounding a given message in its room:
    /// up to `context_size` before and `context_size` after, plus the
    /// message itself, in chronological order.
    pub fn message_context(
        &self,
        message_id: &str,
        context_size: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let (key, message) = self
            .message_entry(message_id)?
            .ok_or_else(|| StorageError::NotFound(format!("message {}", message_id)))?;

        let messages_cf = self.cf(CF_MESSAGES)?;
        let room_prefix = MessageKey::room_prefix(&key.room_id);
        let primary = key.to_bytes();

        // Walk backwards from the entry before the target
        let mut before: Vec<Message> = Vec::new();
        let iter = self
            .db
            .iterator_cf(&messages_cf, IteratorMode::From(&primary, Direction::Reverse));
        for item in iter {
            let (k, value) = item?;
            if !k.starts_with(&room_prefix) {
                break;
            }
            if k.as_ref() == primary.as_slice() {
                continue;
            }
            before.push(serde_json::from_slice(&value)?);
            if before.len() >= context_size {
                break;
            }
        }
        before.reverse();

        // Walk forwards from the entry after the target
        let mut after: Vec<Message> = Vec::new();
        let iter = self
            .db
            .iterator_cf(&messages_cf, IteratorMode::From(&primary, Direction::Forward));
        for item in iter {
            let (k, value) = item?;
            if !k.starts_with(&room_prefix) {
                break;
            }
            if k.as_ref() == primary.as_slice() {
                continue;
            }
            after.push(serde_json::from_slice(&value)?);
            if after.len() >= context_size {
                break;
            }
        }

        let mut context = before;
        context.push(message);
        context.extend(after);
        Ok(context)
    }

    // ===== Generic Column Family Operations =====

    /// Put a value into a specific column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Get a value from a specific column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        let result = self.db.get_cf(&cf, key)?;
        Ok(result)
    }

    /// Delete a value from a specific column family.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(&cf, key)?;
        Ok(())
    }

    /// Iterate over entries with a given prefix in a column family.
    ///
    /// Returns (key, value) pairs in lexicographic key order.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }

        Ok(results)
    }

    /// Apply a set of operations atomically, possibly across column
    /// families.
    pub fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { cf, key, value } => {
                    let handle = self.cf(cf)?;
                    batch.put_cf(&handle, key, value);
                }
                BatchOp::Delete { cf, key } => {
                    let handle = self.cf(cf)?;
                    batch.delete_cf(&handle, key);
                }
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }
}
