//! # convo-topics
//!
//! The topic half of the distillation pipeline: density-based clustering
//! of embedded messages into topic candidates, nearest-centroid
//! assignment of new messages to existing topics, and persistence of
//! topics with their message links, citations, and summary history.

pub mod clusterer;
pub mod error;
pub mod similarity;
pub mod storage;

pub use clusterer::{assign_to_nearest, detect_candidates, generate_title, TopicCandidate};
pub use error::TopicsError;
pub use similarity::{centroid, cosine_similarity, mean_pairwise_similarity};
pub use storage::{TopicStorage, TopicWithCitations};
