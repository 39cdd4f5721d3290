//! Configuration for the distillation pipeline.
//!
//! All sections deserialize with serde defaults so a partial config file
//! only overrides what it names.

use serde::{Deserialize, Serialize};

/// Master configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistillConfig {
    #[serde(default)]
    pub windowing: WindowingConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
}

/// Conversation windowing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowingConfig {
    /// Gap that starts a new window (default 2 hours)
    #[serde(default = "default_gap_ms")]
    pub gap_ms: i64,

    /// Maximum window span (default 4 hours)
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: i64,

    /// Minimum messages for a window to be emitted
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,

    /// Maximum messages per window
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Default fetch limit for message queries
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for WindowingConfig {
    fn default() -> Self {
        Self {
            gap_ms: default_gap_ms(),
            max_duration_ms: default_max_duration_ms(),
            min_messages: default_min_messages(),
            max_messages: default_max_messages(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_gap_ms() -> i64 {
    2 * 60 * 60 * 1000
}
fn default_max_duration_ms() -> i64 {
    4 * 60 * 60 * 1000
}
fn default_min_messages() -> usize {
    2
}
fn default_max_messages() -> usize {
    35
}
fn default_fetch_limit() -> usize {
    500
}

/// Density clustering thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum messages to form a topic
    #[serde(default = "default_min_cluster_messages")]
    pub min_messages: usize,

    /// Cosine similarity threshold for neighborhood membership
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Maximum topic candidates per detection run
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Maximum messages pulled into a detection run
    #[serde(default = "default_detection_limit")]
    pub detection_limit: usize,

    /// Minimum message text length for clustering eligibility
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,

    /// Pairwise-similarity sample size for cluster confidence
    #[serde(default = "default_confidence_sample")]
    pub confidence_sample: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_messages: default_min_cluster_messages(),
            similarity_threshold: default_similarity_threshold(),
            max_topics: default_max_topics(),
            detection_limit: default_detection_limit(),
            min_text_len: default_min_text_len(),
            confidence_sample: default_confidence_sample(),
        }
    }
}

fn default_min_cluster_messages() -> usize {
    3
}
fn default_similarity_threshold() -> f32 {
    0.75
}
fn default_max_topics() -> usize {
    10
}
fn default_detection_limit() -> usize {
    200
}
fn default_min_text_len() -> usize {
    10
}
fn default_confidence_sample() -> usize {
    10
}

/// Thread analysis settings.
///
/// Model name and token budget are not set here; they belong to the
/// completion client's own configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum title length kept after sanitization
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_title_len: default_max_title_len(),
        }
    }
}

fn default_max_title_len() -> usize {
    100
}

/// Summary generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Minimum keyword length for partial claim-span matching
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_keyword_len: default_min_keyword_len(),
        }
    }
}

fn default_min_keyword_len() -> usize {
    4
}

/// Debounce scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Debounce delay before a room's thread pass (ms)
    #[serde(default = "default_debounce_ms")]
    pub thread_debounce_ms: u64,

    /// Debounce delay before a topic's summary regeneration (ms)
    #[serde(default = "default_debounce_ms")]
    pub regeneration_debounce_ms: u64,

    /// Unprocessed windows handled per pass
    #[serde(default = "default_windows_per_pass")]
    pub windows_per_pass: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            thread_debounce_ms: default_debounce_ms(),
            regeneration_debounce_ms: default_debounce_ms(),
            windows_per_pass: default_windows_per_pass(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    30_000
}
fn default_windows_per_pass() -> usize {
    10
}

/// Historical backfill settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Maximum messages fetched for a backfill run
    #[serde(default = "default_backfill_limit")]
    pub limit: usize,

    /// Windows processed between delays
    #[serde(default = "default_backfill_batch")]
    pub batch_size: usize,

    /// Delay between batches (ms); rate-limit courtesy to the LLM provider
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            limit: default_backfill_limit(),
            batch_size: default_backfill_batch(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_backfill_limit() -> usize {
    500
}
fn default_backfill_batch() -> usize {
    10
}
fn default_batch_delay_ms() -> u64 {
    1_000
}
