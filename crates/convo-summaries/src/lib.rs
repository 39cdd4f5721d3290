//! # convo-summaries
//!
//! Cited topic summaries: generation, claim span location, citation
//! validation, and transactional regeneration with version history.

pub mod error;
pub mod generator;

pub use error::SummaryError;
pub use generator::{fallback_summary, locate_claim_span, GeneratedSummary, SummaryGenerator};
