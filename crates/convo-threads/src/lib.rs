//! # convo-threads
//!
//! The thread half of the distillation pipeline: group a room's message
//! stream into gap-delimited conversation windows, analyze each window
//! into a category, title, summary, decisions, and open items, and
//! persist the result atomically with the message backfill.
//!
//! Analysis is fail-open: when the completion service is unconfigured,
//! unreachable, or returns garbage, the heuristic fallback produces a
//! lower-confidence analysis instead of an error.

pub mod analyzer;
pub mod error;
pub mod storage;
pub mod windower;

pub use analyzer::{DecisionDraft, OpenItemDraft, ThreadAnalyzer, WindowAnalysis};
pub use error::ThreadsError;
pub use storage::{CategoryGroup, ThreadDetails, ThreadListing, ThreadStorage};
pub use windower::{window_messages, ConversationWindower};
