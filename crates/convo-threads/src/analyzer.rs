//! Structured thread analysis with heuristic fallback.
//!
//! The analyzer asks the completion service for a JSON analysis of one
//! conversation window and sanitizes the result against the window's
//! actual contents. The LLM call, parse, and schema validation form one
//! fallible step; any failure routes to a deterministic heuristic so the
//! caller always gets an analysis back.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use convo_llm::{extract_json, CompletionClient};
use convo_types::{AnalyzerConfig, Category, ConversationWindow, MessageId};

use crate::error::ThreadsError;

/// Confidence assigned when the model omits or mangles its own.
const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Confidence assigned to heuristic fallback analyses.
const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Structured analysis of one conversation window.
#[derive(Debug, Clone)]
pub struct WindowAnalysis {
    pub category: Category,
    pub title: String,
    pub summary: String,
    pub decisions: Vec<DecisionDraft>,
    pub open_items: Vec<OpenItemDraft>,
    pub key_message_ids: Vec<MessageId>,
    pub confidence: f32,
}

/// A decision extracted from the window, not yet persisted.
#[derive(Debug, Clone)]
pub struct DecisionDraft {
    pub text: String,
    pub decided_by: Option<String>,
    pub source_message_ids: Vec<MessageId>,
}

/// An open item extracted from the window, not yet persisted.
#[derive(Debug, Clone)]
pub struct OpenItemDraft {
    pub text: String,
    pub assigned_to: Option<String>,
    pub source_message_ids: Vec<MessageId>,
}

/// Raw model output, before sanitization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    category: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    decisions: Vec<RawItem>,
    #[serde(default)]
    open_items: Vec<RawItem>,
    #[serde(default)]
    key_message_ids: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(default)]
    text: String,
    #[serde(default, alias = "decidedBy")]
    assigned_to: Option<String>,
    #[serde(default)]
    source_message_ids: Vec<String>,
}

/// Analyzes conversation windows into categories, titles, summaries,
/// decisions, and open items.
pub struct ThreadAnalyzer {
    llm: Option<Arc<dyn CompletionClient>>,
    config: AnalyzerConfig,
}

impl ThreadAnalyzer {
    /// Create an analyzer backed by a completion client.
    pub fn new(llm: Arc<dyn CompletionClient>, config: AnalyzerConfig) -> Self {
        Self {
            llm: Some(llm),
            config,
        }
    }

    /// Create an analyzer with no completion client; every window takes
    /// the heuristic path.
    pub fn without_llm(config: AnalyzerConfig) -> Self {
        Self { llm: None, config }
    }

    /// Whether model-backed analysis is expected to work.
    pub fn is_available(&self) -> bool {
        self.llm.as_ref().is_some_and(|c| c.is_available())
    }

    /// Analyze one window. Infallible to the caller: model problems
    /// degrade to the heuristic fallback rather than erroring.
    pub async fn analyze_window(&self, window: &ConversationWindow) -> WindowAnalysis {
        match self.try_analyze(window).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "window analysis failed, using heuristic fallback");
                self.fallback_analysis(window)
            }
        }
    }

    /// Model-backed path: call, parse, and validate as one fallible step.
    async fn try_analyze(
        &self,
        window: &ConversationWindow,
    ) -> Result<WindowAnalysis, ThreadsError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(convo_llm::LlmError::Unavailable)?;

        let prompt = self.build_prompt(window);
        let response = llm.complete(&prompt).await?;

        let raw: RawAnalysis = serde_json::from_str(&extract_json(&response))
            .map_err(|e| ThreadsError::InvalidAnalysis(e.to_string()))?;

        if raw.summary.trim().is_empty() {
            return Err(ThreadsError::InvalidAnalysis(
                "empty summary in model output".to_string(),
            ));
        }

        Ok(self.sanitize(raw, window))
    }

    fn build_prompt(&self, window: &ConversationWindow) -> String {
        let categories: String = Category::all()
            .iter()
            .map(|c| format!("- {}: {}", c.as_str(), c.description()))
            .collect::<Vec<_>>()
            .join("\n");

        let transcript: String = window
            .messages
            .iter()
            .map(|m| {
                format!(
                    "[{}] ({}) {}: {}",
                    m.timestamp.format("%Y-%m-%d %H:%M"),
                    m.id,
                    m.display_name(),
                    m.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Analyze this conversation between family members coordinating around their children.

CATEGORIES:
{categories}

CONVERSATION (each line is [time] (message-id) sender: text):
{transcript}

Provide your response in JSON format:
{{
  "category": "one of the category names above",
  "title": "Short descriptive title (under 10 words)",
  "summary": "2-3 sentence factual summary",
  "decisions": [{{"text": "what was agreed", "decidedBy": "sender id or null", "sourceMessageIds": ["id"]}}],
  "openItems": [{{"text": "what needs follow-up", "assignedTo": "sender id or null", "sourceMessageIds": ["id"]}}],
  "keyMessageIds": ["ids of the most important messages"],
  "confidence": 0.0
}}

Guidelines:
- Only report decisions both parties actually agreed to
- Only reference message ids that appear in the conversation
- confidence is your 0-1 certainty in the categorization"#
        )
    }

    /// Enforce the output contract: known category, bounded title, no
    /// hallucinated message ids, confidence in range.
    fn sanitize(&self, raw: RawAnalysis, window: &ConversationWindow) -> WindowAnalysis {
        let known_ids: HashSet<&str> = window.message_ids.iter().map(String::as_str).collect();

        let keep_known = |ids: Vec<String>| -> Vec<MessageId> {
            ids.into_iter()
                .filter(|id| known_ids.contains(id.as_str()))
                .collect()
        };

        let decisions: Vec<DecisionDraft> = raw
            .decisions
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| DecisionDraft {
                text: d.text,
                decided_by: d.assigned_to,
                source_message_ids: keep_known(d.source_message_ids),
            })
            .collect();

        let open_items: Vec<OpenItemDraft> = raw
            .open_items
            .into_iter()
            .filter(|i| !i.text.trim().is_empty())
            .map(|i| OpenItemDraft {
                text: i.text,
                assigned_to: i.assigned_to,
                source_message_ids: keep_known(i.source_message_ids),
            })
            .collect();

        let confidence = match raw.confidence {
            Some(c) if (0.0..=1.0).contains(&c) => c,
            _ => DEFAULT_CONFIDENCE,
        };

        let mut title = raw.title.trim().to_string();
        if title.is_empty() {
            title = "Conversation".to_string();
        }
        title = truncate_chars(&title, self.config.max_title_len);

        debug!(
            category = %raw.category,
            decisions = decisions.len(),
            open_items = open_items.len(),
            "sanitized window analysis"
        );

        WindowAnalysis {
            category: Category::normalize(&raw.category),
            title,
            summary: raw.summary.trim().to_string(),
            decisions,
            open_items,
            key_message_ids: keep_known(raw.key_message_ids),
            confidence,
        }
    }

    /// Deterministic heuristic used when the model path fails: keyword
    /// category guess and a templated summary.
    pub fn fallback_analysis(&self, window: &ConversationWindow) -> WindowAnalysis {
        let text: String = window
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let category = Category::infer(&text);
        let title = format!(
            "Conversation on {}",
            window.first_message_at.format("%B %d, %Y")
        );
        let summary = format!(
            "A conversation between {} participants with {} messages.",
            window.participants.len(),
            window.len()
        );

        WindowAnalysis {
            category,
            title,
            summary,
            decisions: Vec::new(),
            open_items: Vec::new(),
            key_message_ids: window.message_ids.iter().take(3).cloned().collect(),
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// Truncate on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use convo_llm::{FailingClient, MockClient};
    use convo_types::Message;

    fn window_with(texts: &[&str]) -> ConversationWindow {
        let mut messages = texts.iter().enumerate().map(|(i, text)| {
            Message::new(
                "room-1",
                if i % 2 == 0 { "alice" } else { "bob" },
                *text,
                Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64 * 60_000)
                    .unwrap(),
            )
        });
        let mut window = ConversationWindow::open(messages.next().unwrap());
        for m in messages {
            window.push(m);
        }
        window
    }

    fn analysis_json(window: &ConversationWindow, extra_id: &str) -> String {
        format!(
            r#"{{
                "category": "schedule",
                "title": "Friday pickup change",
                "summary": "Pickup moved to 5pm on Friday.",
                "decisions": [
                    {{"text": "Pickup at 5pm", "decidedBy": "alice",
                      "sourceMessageIds": ["{}", "{}"]}}
                ],
                "openItems": [
                    {{"text": "Confirm with school", "assignedTo": "bob",
                      "sourceMessageIds": ["{}"]}}
                ],
                "keyMessageIds": ["{}", "{}"],
                "confidence": 0.9
            }}"#,
            window.message_ids[0],
            extra_id,
            window.message_ids[1],
            window.message_ids[0],
            extra_id,
        )
    }

    #[tokio::test]
    async fn test_analyze_parses_and_sanitizes() {
        let window = window_with(&["can you grab pickup friday?", "yes, 5pm works"]);
        let json = analysis_json(&window, "01HFAKEHALLUCINATEDID00000");
        let analyzer = ThreadAnalyzer::new(
            Arc::new(MockClient::new(json)),
            AnalyzerConfig::default(),
        );

        let analysis = analyzer.analyze_window(&window).await;
        assert_eq!(analysis.category, Category::Schedule);
        assert_eq!(analysis.title, "Friday pickup change");
        // Hallucinated ids are dropped, real ones kept
        assert_eq!(analysis.decisions[0].source_message_ids.len(), 1);
        assert_eq!(analysis.key_message_ids, vec![window.message_ids[0].clone()]);
        assert!((analysis.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_unknown_category_normalizes_to_default() {
        let window = window_with(&["hello", "hi"]);
        let json = r#"{"category": "gossip", "title": "Chat", "summary": "They chatted."}"#;
        let analyzer = ThreadAnalyzer::new(
            Arc::new(MockClient::new(json)),
            AnalyzerConfig::default(),
        );

        let analysis = analyzer.analyze_window(&window).await;
        assert_eq!(analysis.category, Category::Logistics);
        // Absent confidence defaults
        assert!((analysis.confidence - DEFAULT_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_defaults() {
        let window = window_with(&["hello", "hi"]);
        let json =
            r#"{"category": "schedule", "title": "T", "summary": "S.", "confidence": 7.5}"#;
        let analyzer = ThreadAnalyzer::new(
            Arc::new(MockClient::new(json)),
            AnalyzerConfig::default(),
        );

        let analysis = analyzer.analyze_window(&window).await;
        assert!((analysis.confidence - DEFAULT_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_long_title_truncated() {
        let window = window_with(&["hello", "hi"]);
        let json = format!(
            r#"{{"category": "schedule", "title": "{}", "summary": "S."}}"#,
            "x".repeat(300)
        );
        let analyzer = ThreadAnalyzer::new(
            Arc::new(MockClient::new(json)),
            AnalyzerConfig::default(),
        );

        let analysis = analyzer.analyze_window(&window).await;
        assert_eq!(analysis.title.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_failure_routes_to_fallback() {
        let window = window_with(&[
            "the doctor appointment is at 3pm",
            "ok, I'll bring her medication",
        ]);
        let analyzer =
            ThreadAnalyzer::new(Arc::new(FailingClient), AnalyzerConfig::default());

        let analysis = analyzer.analyze_window(&window).await;
        assert_eq!(analysis.category, Category::Medical);
        assert!((analysis.confidence - FALLBACK_CONFIDENCE).abs() < f32::EPSILON);
        assert!(analysis.summary.contains("2 participants"));
        assert!(analysis.summary.contains("2 messages"));
        assert!(analysis.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_routes_to_fallback() {
        let window = window_with(&["hello", "hi"]);
        let analyzer = ThreadAnalyzer::new(
            Arc::new(MockClient::new("I couldn't analyze that, sorry!")),
            AnalyzerConfig::default(),
        );

        let analysis = analyzer.analyze_window(&window).await;
        assert!((analysis.confidence - FALLBACK_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_without_llm_unavailable_and_falls_back() {
        let analyzer = ThreadAnalyzer::without_llm(AnalyzerConfig::default());
        assert!(!analyzer.is_available());

        let window = window_with(&["hello", "hi"]);
        let analysis = analyzer.analyze_window(&window).await;
        assert!((analysis.confidence - FALLBACK_CONFIDENCE).abs() < f32::EPSILON);
        assert_eq!(analysis.key_message_ids.len(), 2);
    }

}
