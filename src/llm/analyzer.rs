//! Lightweight context analysis over the most recent turns.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::common::ClientFuture;
use crate::common::config::LlmConfig;
use crate::common::errors::{AssistantError, AssistantResult};
use crate::common::session::{ContextAnalysis, Mood, Turn};
use crate::llm::completion::{ChatMessage, ChatRole, CompletionClient, CompletionRequest};

/// System prompt for context analysis.
const ANALYSIS_SYSTEM_PROMPT: &str = "You analyze short phone conversations.
Reply with a single JSON object and nothing else, using exactly these keys:
- \"name\": the caller's first name if they said it, otherwise null
- \"topic\": a one or two word topic label
- \"mood\": one of \"positive\", \"neutral\", \"negative\"
- \"shouldEndCall\": true only if the caller is saying goodbye or has nothing more to discuss";

/// Capability: derive caller context from recent turns.
pub trait ContextAnalyzer: Send + Sync {
    /// Analyze the given turns, oldest first.
    ///
    /// # Errors
    /// Returns an error if the analysis cannot be produced or parsed.
    fn analyze(&self, turns: Vec<Turn>) -> ClientFuture<'_, AssistantResult<ContextAnalysis>>;
}

/// Context analyzer backed by the completion API.
pub struct LlmContextAnalyzer {
    completion: Arc<dyn CompletionClient>,
    model: String,
    temperature: f64,
    max_tokens: u64,
}

impl LlmContextAnalyzer {
    /// Create an analyzer using the analysis settings of `config`.
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionClient>, config: &LlmConfig) -> Self {
        Self {
            completion,
            model: config.analysis_model.clone(),
            temperature: config.analysis_temperature,
            max_tokens: config.analysis_max_tokens,
        }
    }
}

impl ContextAnalyzer for LlmContextAnalyzer {
    fn analyze(&self, turns: Vec<Turn>) -> ClientFuture<'_, AssistantResult<ContextAnalysis>> {
        Box::pin(async move {
            if turns.is_empty() {
                return Err(AssistantError::Analysis("no turns to analyze".to_string()));
            }

            let request = CompletionRequest {
                messages: vec![
                    ChatMessage::new(ChatRole::System, ANALYSIS_SYSTEM_PROMPT),
                    ChatMessage::new(ChatRole::User, render_transcript(&turns)),
                ],
                model: self.model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let output = self
                .completion
                .complete(request)
                .await
                .map_err(|err| AssistantError::Analysis(err.to_string()))?;
            debug!(turns = turns.len(), "Context analysis returned");
            parse_analysis(&output.text)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    name: Option<String>,
    topic: Option<String>,
    mood: Option<String>,
    #[serde(rename = "shouldEndCall", alias = "should_end_call")]
    should_end_call: Option<bool>,
}

fn render_transcript(turns: &[Turn]) -> String {
    let mut out = String::from("Conversation:\n");
    for turn in turns {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push_str("\nReturn the JSON object.");
    out
}

/// Parse the analyzer's reply, tolerating prose or code fences around the JSON object.
///
/// Keys missing from the reply stay `None` so a merge leaves those context fields alone.
///
/// # Errors
/// Returns an error if no JSON object can be found or decoded.
pub fn parse_analysis(text: &str) -> AssistantResult<ContextAnalysis> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(AssistantError::Analysis(
                "no JSON object in analysis reply".to_string(),
            ));
        }
    };

    let raw: RawAnalysis = serde_json::from_str(json)?;
    Ok(ContextAnalysis {
        subject_name: raw.name.and_then(meaningful),
        topic: raw.topic.and_then(meaningful),
        mood: raw.mood.map(|mood| mood.parse::<Mood>().unwrap_or_default()),
        should_end_call: raw.should_end_call,
    })
}

fn meaningful(value: String) -> Option<String> {
    let trimmed = value.trim();
    let placeholder = ["", "null", "none", "unknown", "n/a"]
        .iter()
        .any(|p| trimmed.eq_ignore_ascii_case(p));
    if placeholder {
        None
    } else {
        Some(trimmed.to_string())
    }
}
