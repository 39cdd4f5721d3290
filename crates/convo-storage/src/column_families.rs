//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with a distinct access pattern:
//! - messages: the room message stream, keyed by room + source time
//! - message_index: message id -> primary message key
//! - threads: analyzed conversation threads
//! - decisions / open_items: structured items extracted per thread
//! - topics: semantic topic records
//! - topic_messages: topic-to-message links
//! - citations: claim-to-source spans for the current summary version
//! - summary_history: append-only snapshots of superseded summaries

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family for the room message stream
pub const CF_MESSAGES: &str = "messages";

/// Column family mapping message id to its primary key
pub const CF_MESSAGE_INDEX: &str = "message_index";

/// Column family for analyzed threads
pub const CF_THREADS: &str = "threads";

/// Column family for decisions extracted from threads
pub const CF_DECISIONS: &str = "decisions";

/// Column family for open items extracted from threads
pub const CF_OPEN_ITEMS: &str = "open_items";

/// Column family for topic records
pub const CF_TOPICS: &str = "topics";

/// Column family for topic-message links
pub const CF_TOPIC_MESSAGES: &str = "topic_messages";

/// Column family for current-version summary citations
pub const CF_CITATIONS: &str = "citations";

/// Column family for archived summary versions
pub const CF_SUMMARY_HISTORY: &str = "summary_history";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_MESSAGES,
    CF_MESSAGE_INDEX,
    CF_THREADS,
    CF_DECISIONS,
    CF_OPEN_ITEMS,
    CF_TOPICS,
    CF_TOPIC_MESSAGES,
    CF_CITATIONS,
    CF_SUMMARY_HISTORY,
];

/// Create column family options for messages (append-only, compressed)
fn messages_options() -> Options {
    let mut opts = Options::default();
    // Zstd compression for space efficiency
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Create column family options for summary history (append-only, compressed)
fn history_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_MESSAGES, messages_options()),
        ColumnFamilyDescriptor::new(CF_MESSAGE_INDEX, Options::default()),
        ColumnFamilyDescriptor::new(CF_THREADS, Options::default()),
        ColumnFamilyDescriptor::new(CF_DECISIONS, Options::default()),
        ColumnFamilyDescriptor::new(CF_OPEN_ITEMS, Options::default()),
        ColumnFamilyDescriptor::new(CF_TOPICS, Options::default()),
        ColumnFamilyDescriptor::new(CF_TOPIC_MESSAGES, Options::default()),
        ColumnFamilyDescriptor::new(CF_CITATIONS, Options::default()),
        ColumnFamilyDescriptor::new(CF_SUMMARY_HISTORY, history_options()),
    ]
}
