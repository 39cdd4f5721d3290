//! Cited summary generation.
//!
//! The generator asks the completion service for a short factual summary
//! plus (claim, supporting message ids) pairs, locates each claim's span
//! inside the generated text, and validates every supporting id against
//! the topic's linked messages. Citations carrying unknown ids are
//! discarded whole. On any failure the deterministic fallback produces a
//! one-sentence summary citing the earliest message.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use convo_llm::{extract_json, CompletionClient};
use convo_topics::TopicStorage;
use convo_types::{Citation, Message, SummaryConfig, Topic};

use crate::error::SummaryError;

/// A generated summary with span-located citations, not yet persisted.
#[derive(Debug, Clone)]
pub struct GeneratedSummary {
    pub summary: String,
    pub citations: Vec<Citation>,
}

/// Raw model output, before span location and validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummary {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCitation {
    #[serde(default)]
    claim: String,
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Generates and regenerates cited topic summaries.
pub struct SummaryGenerator {
    llm: Option<Arc<dyn CompletionClient>>,
    topics: Arc<TopicStorage>,
    config: SummaryConfig,
}

impl SummaryGenerator {
    pub fn new(
        llm: Option<Arc<dyn CompletionClient>>,
        topics: Arc<TopicStorage>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            llm,
            topics,
            config,
        }
    }

    /// Generate a summary for a topic's message set. Infallible to the
    /// caller: model problems degrade to the deterministic fallback.
    pub async fn generate_summary(&self, topic: &Topic, messages: &[Message]) -> GeneratedSummary {
        match self.try_generate(topic, messages).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(topic_id = %topic.id, error = %e, "summary generation failed, using fallback");
                fallback_summary(topic, messages)
            }
        }
    }

    /// Regenerate a topic's summary and apply it transactionally:
    /// current version into history, version + 1, citation rows replaced.
    pub async fn regenerate(&self, topic_id: &str) -> Result<Topic, SummaryError> {
        let topic = self
            .topics
            .get_topic(topic_id)?
            .ok_or_else(|| SummaryError::NotFound(topic_id.to_string()))?;
        let messages = self.topics.linked_messages(topic_id)?;

        let generated = self.generate_summary(&topic, &messages).await;
        let updated =
            self.topics
                .apply_regeneration(topic_id, &generated.summary, &generated.citations)?;

        info!(
            topic_id = %topic_id,
            version = updated.summary_version,
            "regenerated summary"
        );
        Ok(updated)
    }

    async fn try_generate(
        &self,
        topic: &Topic,
        messages: &[Message],
    ) -> Result<GeneratedSummary, SummaryError> {
        let llm = self.llm.as_ref().ok_or(convo_llm::LlmError::Unavailable)?;
        if messages.is_empty() {
            return Err(SummaryError::InvalidOutput(
                "no linked messages".to_string(),
            ));
        }

        let prompt = self.build_prompt(topic, messages);
        let response = llm.complete(&prompt).await?;

        let raw: RawSummary = serde_json::from_str(&extract_json(&response))
            .map_err(|e| SummaryError::InvalidOutput(e.to_string()))?;
        if raw.summary.trim().is_empty() {
            return Err(SummaryError::InvalidOutput(
                "empty summary in model output".to_string(),
            ));
        }

        let summary = raw.summary.trim().to_string();
        let known_ids: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();

        let mut citations = Vec::new();
        for raw_citation in raw.citations {
            if raw_citation.claim.trim().is_empty() || raw_citation.message_ids.is_empty() {
                continue;
            }
            // Any unknown supporting id poisons the whole citation
            if raw_citation
                .message_ids
                .iter()
                .any(|id| !known_ids.contains(id.as_str()))
            {
                debug!(topic_id = %topic.id, claim = %raw_citation.claim, "dropping citation with unknown message ids");
                continue;
            }

            let (start, end) =
                locate_claim_span(&summary, &raw_citation.claim, self.config.min_keyword_len);
            citations.push(Citation::new(
                &topic.id,
                raw_citation.claim,
                start,
                end,
                raw_citation.message_ids,
            ));
        }

        Ok(GeneratedSummary { summary, citations })
    }

    fn build_prompt(&self, topic: &Topic, messages: &[Message]) -> String {
        let participants: Vec<&str> = {
            let mut seen = Vec::new();
            for m in messages {
                let name = m.display_name();
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
            seen
        };

        let transcript: String = messages
            .iter()
            .map(|m| {
                format!(
                    "({}) [{}] {}: {}",
                    m.id,
                    m.timestamp.format("%Y-%m-%d %H:%M"),
                    m.display_name(),
                    m.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Summarize this "{title}" discussion ({category}) between {participants}.

MESSAGES (each line is (message-id) [time] sender: text):
{transcript}

Provide your response in JSON format:
{{
  "summary": "2-4 factual sentences",
  "citations": [
    {{"claim": "exact phrase from your summary", "messageIds": ["supporting message id"]}}
  ]
}}

Guidelines:
- Every factual claim in the summary must appear as a citation
- Each claim must be quoted verbatim from your summary text
- Only reference message ids listed above"#,
            title = topic.title,
            category = topic.category.as_str(),
            participants = participants.join(", "),
        )
    }
}

/// Locate a claim inside the summary text.
///
/// Exact case-insensitive substring first; failing that, the first
/// claim keyword of at least `min_keyword_len` chars found in the
/// summary; failing that, a default span anchored at the start with the
/// claim's own length.
///
/// Matching runs over the lowercased summary. The handful of characters
/// whose lowercase form changes byte length (e.g. 'İ') can shift the
/// indices relative to the original text, so the span is snapped onto
/// char boundaries of the original before returning.
pub fn locate_claim_span(summary: &str, claim: &str, min_keyword_len: usize) -> (usize, usize) {
    let summary_lower = summary.to_lowercase();
    let claim_lower = claim.to_lowercase();

    let span = if let Some(start) = summary_lower.find(&claim_lower) {
        (start, start + claim_lower.len())
    } else {
        claim_lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.len() >= min_keyword_len)
            .find_map(|keyword| {
                summary_lower
                    .find(keyword)
                    .map(|start| (start, start + keyword.len()))
            })
            .unwrap_or((0, claim.len()))
    };

    (snap_to_boundary(summary, span.0), snap_to_boundary(summary, span.1))
}

/// Snap a byte index into `text` down to the nearest char boundary.
fn snap_to_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Deterministic fallback: one sentence naming the category and message
/// count, citing the earliest message.
pub fn fallback_summary(topic: &Topic, messages: &[Message]) -> GeneratedSummary {
    let summary = format!(
        "Discussion about {} with {} messages.",
        topic.category.as_str(),
        messages.len()
    );

    let citations = match messages.iter().min_by_key(|m| m.timestamp) {
        Some(earliest) => vec![Citation::new(
            &topic.id,
            "Discussion",
            0,
            10,
            vec![earliest.id.clone()],
        )],
        None => Vec::new(),
    };

    GeneratedSummary { summary, citations }
}
