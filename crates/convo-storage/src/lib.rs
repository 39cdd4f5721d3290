//! # convo-storage
//!
//! RocksDB persistence for the conversation distillation subsystem.
//!
//! All records are JSON values under string keys. Column families split the
//! data by access pattern (see [`column_families`]); message keys embed the
//! room and a zero-padded source timestamp so prefix scans yield a room's
//! stream in time order (see [`keys`]).
//!
//! Higher-level crates keep their own typed storage wrappers on top of the
//! generic operations here; multi-record transitions (thread creation,
//! summary regeneration) go through [`BatchOp`] write batches.

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use column_families::{
    ALL_CF_NAMES, CF_CITATIONS, CF_DECISIONS, CF_MESSAGES, CF_MESSAGE_INDEX, CF_OPEN_ITEMS,
    CF_SUMMARY_HISTORY, CF_THREADS, CF_TOPICS, CF_TOPIC_MESSAGES,
};
pub use db::{BatchOp, Storage};
pub use error::StorageError;
pub use keys::MessageKey;
