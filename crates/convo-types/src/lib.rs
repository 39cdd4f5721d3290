//! # convo-types
//!
//! Core data model for the conversation distillation subsystem.
//!
//! Two complementary structures are distilled from a room's message stream:
//! - **Threads**: gap-delimited conversation windows analyzed into a
//!   category, title, summary, decisions, and open items.
//! - **Topics**: semantically clustered subject matter spanning many
//!   conversations, each carrying a cited, versioned summary.
//!
//! This crate holds the shared records, the fixed category enumeration, the
//! room-scoped event type, and all configuration structs.

pub mod category;
pub mod config;
pub mod event;
pub mod message;
pub mod thread;
pub mod topic;
pub mod window;

pub use category::Category;
pub use config::{
    AnalyzerConfig, BackfillConfig, ClusteringConfig, DistillConfig, SchedulingConfig,
    SummaryConfig, WindowingConfig,
};
pub use event::RoomEvent;
pub use message::{Message, MessageId, MessageKind};
pub use thread::{Decision, OpenItem, OpenItemStatus, ProcessingStatus, Thread};
pub use topic::{Citation, SummarySnapshot, Topic, TopicMessage};
pub use window::ConversationWindow;
