//! Density-based topic detection over message embeddings.
//!
//! DBSCAN-style clustering: a message with enough sufficiently-similar
//! neighbors seeds a cluster, which expands transitively through other
//! dense members. Sparse messages are noise and join no cluster.
//!
//! Cluster membership in boundary cases depends on the processing order
//! of the input pool; reordering the same messages can move a borderline
//! message between two adjacent clusters. This is accepted, not a defect.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use convo_types::{Category, ClusteringConfig, Message, MessageId, MessageKind};

use crate::similarity::{cosine_similarity, mean_pairwise_similarity};

/// Title used when no tokens survive the stopword filter.
const FALLBACK_TITLE: &str = "General Discussion";

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "have", "has", "been", "were", "will",
    "would", "could", "should", "there", "their", "what", "when", "where", "which", "about",
    "into", "through", "your", "just", "like", "know", "think", "going", "want", "need", "then",
    "them", "they", "because", "okay", "yeah", "also", "some", "more", "here",
];

/// A detected cluster, not yet persisted as a topic.
#[derive(Debug, Clone)]
pub struct TopicCandidate {
    pub messages: Vec<Message>,
    pub message_ids: Vec<MessageId>,
    pub title: String,
    pub category: Category,
    /// Mean pairwise similarity over a bounded sample of the cluster
    pub confidence: f32,
    pub first_message_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

/// Whether a message can participate in clustering: user-authored, with
/// an embedding, and enough text to mean something.
pub fn clusterable(message: &Message, min_text_len: usize) -> bool {
    message.kind == MessageKind::User
        && message.embedding.is_some()
        && message.text.trim().len() > min_text_len
}

/// Detect topic candidates in a set of messages.
///
/// Candidates come back largest cluster first, capped at
/// `config.max_topics`. Returns an empty vec when fewer than
/// `config.min_messages` clusterable messages are available, skipping
/// the similarity computation entirely.
pub fn detect_candidates(messages: &[Message], config: &ClusteringConfig) -> Vec<TopicCandidate> {
    let pool: Vec<&Message> = messages
        .iter()
        .filter(|m| clusterable(m, config.min_text_len))
        .collect();

    if pool.len() < config.min_messages {
        return Vec::new();
    }

    let mut clusters = cluster_indices(&pool, config);
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters.truncate(config.max_topics);

    debug!(
        pool = pool.len(),
        clusters = clusters.len(),
        "density clustering complete"
    );

    clusters
        .into_iter()
        .map(|indices| build_candidate(&pool, &indices, config))
        .collect()
}

/// Core DBSCAN pass over the pool, returning clusters as index sets.
fn cluster_indices(pool: &[&Message], config: &ClusteringConfig) -> Vec<Vec<usize>> {
    let n = pool.len();
    let min_neighbors = config.min_messages.saturating_sub(1);

    let neighbors_of = |i: usize| -> Vec<usize> {
        let a = pool[i].embedding.as_deref().unwrap_or(&[]);
        (0..n)
            .filter(|&j| j != i)
            .filter(|&j| {
                let b = pool[j].embedding.as_deref().unwrap_or(&[]);
                cosine_similarity(a, b) >= config.similarity_threshold
            })
            .collect()
    };

    let mut visited = vec![false; n];
    let mut clustered = vec![false; n];
    let mut clusters = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seeds = neighbors_of(i);
        if seeds.len() < min_neighbors {
            // Noise; may still be absorbed by a later cluster expansion
            continue;
        }

        let mut cluster = vec![i];
        clustered[i] = true;
        let mut queue = seeds;

        while let Some(j) = queue.pop() {
            if !clustered[j] {
                cluster.push(j);
                clustered[j] = true;
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let j_neighbors = neighbors_of(j);
            // Only dense members expand the cluster further
            if j_neighbors.len() >= min_neighbors {
                for k in j_neighbors {
                    if !clustered[k] {
                        queue.push(k);
                    }
                }
            }
        }

        if cluster.len() >= config.min_messages {
            clusters.push(cluster);
        } else {
            for &j in &cluster {
                clustered[j] = false;
            }
        }
    }

    clusters
}

fn build_candidate(
    pool: &[&Message],
    indices: &[usize],
    config: &ClusteringConfig,
) -> TopicCandidate {
    let mut members: Vec<&Message> = indices.iter().map(|&i| pool[i]).collect();
    members.sort_by_key(|m| m.timestamp);

    let combined_text: String = members
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let embeddings: Vec<&[f32]> = members
        .iter()
        .filter_map(|m| m.embedding.as_deref())
        .collect();

    TopicCandidate {
        message_ids: members.iter().map(|m| m.id.clone()).collect(),
        title: generate_title(&combined_text),
        category: Category::infer(&combined_text),
        confidence: mean_pairwise_similarity(&embeddings, config.confidence_sample),
        first_message_at: members.first().map(|m| m.timestamp).unwrap_or_else(Utc::now),
        last_message_at: members.last().map(|m| m.timestamp).unwrap_or_else(Utc::now),
        messages: members.into_iter().cloned().collect(),
    }
}

/// Derive a title from cluster text: rank non-stopword tokens by
/// frequency, take the top 3, capitalize, join with " & ".
pub fn generate_title(text: &str) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: HashMap<String, usize> = HashMap::new();

    for (position, token) in text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
        .enumerate()
    {
        order.entry(token.clone()).or_insert(position);
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    // First appearance breaks frequency ties so the title is stable
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| order[&a.0].cmp(&order[&b.0])));

    let title: Vec<String> = ranked
        .into_iter()
        .take(3)
        .map(|(word, _)| capitalize(&word))
        .collect();

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title.join(" & ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Greedy nearest-centroid assignment: the topic whose centroid is most
/// similar to `embedding`, if that similarity clears the threshold.
///
/// Equal similarity resolves to the lexicographically lowest topic id so
/// assignment does not depend on iteration order.
pub fn assign_to_nearest(
    embedding: &[f32],
    centroids: &[(String, Vec<f32>)],
    threshold: f32,
) -> Option<String> {
    let mut best: Option<(&str, f32)> = None;

    for (topic_id, centroid) in centroids {
        let sim = cosine_similarity(embedding, centroid);
        if sim < threshold {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_id, best_sim)) => {
                sim > best_sim || (sim == best_sim && topic_id.as_str() < best_id)
            }
        };
        if better {
            best = Some((topic_id, sim));
        }
    }

    best.map(|(id, _)| id.to_string())
}
