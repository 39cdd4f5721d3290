//! Debounced orchestration of the distillation pipeline.
//!
//! Two orchestrators sit above the storage, thread, topic, and summary
//! layers:
//!
//! - [`ThreadOrchestrator`] coalesces message arrivals per room and
//!   turns windows of conversation into analyzed threads.
//! - [`TopicOrchestrator`] runs topic detection, assigns new messages
//!   to existing topics, and regenerates cited summaries, debounced
//!   per topic.
//!
//! Both publish [`convo_types::RoomEvent`]s on an [`EventBus`] for
//! downstream fan-out.

pub mod debounce;
pub mod error;
pub mod events;
pub mod thread_orchestrator;
pub mod topic_orchestrator;

pub use debounce::DebounceScheduler;
pub use error::OrchestratorError;
pub use events::EventBus;
pub use thread_orchestrator::ThreadOrchestrator;
pub use topic_orchestrator::TopicOrchestrator;
