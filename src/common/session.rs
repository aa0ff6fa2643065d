//! Per-call session model: turns, derived context, and telemetry.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Caller speech.
    User,
    /// Assistant reply.
    Assistant,
}

impl TurnRole {
    /// Stable string form used in prompts and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token counts reported by the completion API.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
    /// Sum reported by the provider.
    pub total_tokens: u64,
}

/// Free-form annotations attached to a turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Speech recognition confidence for caller turns.
    pub confidence: Option<f64>,
    /// Model that produced an assistant turn.
    pub model: Option<String>,
    /// Token usage of an assistant turn.
    pub usage: Option<TokenUsage>,
}

/// One utterance exchanged on the call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: TurnRole,
    /// What was said.
    pub content: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// Recognition or generation details.
    pub metadata: TurnMetadata,
}

impl Turn {
    /// Build a caller turn.
    #[must_use]
    pub fn user(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: TurnMetadata {
                confidence: Some(confidence),
                ..TurnMetadata::default()
            },
        }
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(
        content: impl Into<String>,
        model: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: TurnMetadata {
                confidence: None,
                model: Some(model.into()),
                usage: Some(usage),
            },
        }
    }
}

/// Caller mood as classified by context analysis.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// Caller sounds pleased.
    Positive,
    /// No strong signal.
    #[default]
    Neutral,
    /// Caller sounds upset.
    Negative,
}

impl Mood {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(other.to_string()),
        }
    }
}

/// Fields extracted from recent turns. `None` leaves the session value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextAnalysis {
    /// Caller's name, if mentioned.
    pub subject_name: Option<String>,
    /// Short topic label.
    pub topic: Option<String>,
    /// Mood classification.
    pub mood: Option<Mood>,
    /// Whether the conversation seems finished.
    pub should_end_call: Option<bool>,
}

impl ContextAnalysis {
    /// Analysis used whenever the analyzer fails or returns garbage.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            subject_name: None,
            topic: Some("general".to_string()),
            mood: Some(Mood::Neutral),
            should_end_call: Some(false),
        }
    }
}

/// Derived conversational metadata biasing later prompts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Caller's name.
    pub subject_name: Option<String>,
    /// Current topic.
    pub topic: Option<String>,
    /// Current mood.
    pub mood: Mood,
    /// End-of-call signal from analysis. Stored only; nothing acts on it yet.
    pub should_end_call: bool,
}

impl SessionContext {
    /// Shallow merge: only fields present in `analysis` change.
    pub fn merge(&mut self, analysis: ContextAnalysis) {
        if let Some(name) = analysis.subject_name {
            self.subject_name = Some(name);
        }
        if let Some(topic) = analysis.topic {
            self.topic = Some(topic);
        }
        if let Some(mood) = analysis.mood {
            self.mood = mood;
        }
        if let Some(should_end_call) = analysis.should_end_call {
            self.should_end_call = should_end_call;
        }
    }
}

/// Per-call response-time and error telemetry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Completed turns.
    pub turn_count: u64,
    /// Running mean of turn durations.
    pub average_response_time_ms: f64,
    /// Completion failures.
    pub error_count: u64,
    /// Turns answered with the provider voice because synthesis failed.
    pub synthesis_fallbacks: u64,
}

impl SessionMetrics {
    /// Count a finished turn and fold its duration into the running mean.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_turn(&mut self, elapsed_ms: f64) {
        self.turn_count += 1;
        let n = self.turn_count as f64;
        self.average_response_time_ms =
            self.average_response_time_ms.mul_add(n - 1.0, elapsed_ms) / n;
    }
}

/// State held for one active call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Call identifier assigned by the telephony provider.
    pub id: String,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Last access time.
    pub last_activity_at: DateTime<Utc>,
    /// Sliding window of recent turns, oldest first.
    pub history: VecDeque<Turn>,
    /// Maximum history length.
    pub history_limit: usize,
    /// Derived context.
    pub context: SessionContext,
    /// Telemetry.
    pub metrics: SessionMetrics,
    /// Whether the call-start greeting was issued.
    pub greeted: bool,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new(id: impl Into<String>, history_limit: usize, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            started_at: now,
            last_activity_at: now,
            history: VecDeque::with_capacity(history_limit),
            history_limit: history_limit.max(1),
            context: SessionContext::default(),
            metrics: SessionMetrics::default(),
            greeted: false,
        }
    }

    /// Append a turn, evicting the oldest ones beyond the limit.
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push_back(turn);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// The most recent `count` turns regardless of role, oldest first.
    #[must_use]
    pub fn recent_turns(&self, count: usize) -> Vec<Turn> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Seconds since the call started.
    #[must_use]
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.started_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_never_exceeds_limit() {
        let mut session = Session::new("c1", 10, Utc::now());
        for i in 0..11 {
            session.push_turn(Turn::user(format!("turn {i}"), 0.9));
            assert!(session.history.len() <= 10);
        }
        assert_eq!(session.history.len(), 10);
        assert_eq!(session.history[0].content, "turn 1");
        assert!(session.history.iter().all(|t| t.content != "turn 0"));
    }

    #[test]
    fn test_recent_turns_keeps_most_recent() {
        let mut session = Session::new("c1", 10, Utc::now());
        for i in 0..7 {
            session.push_turn(Turn::user(format!("turn {i}"), 0.5));
        }
        let recent = session.recent_turns(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "turn 2");
        assert_eq!(recent[4].content, "turn 6");
        assert_eq!(session.recent_turns(50).len(), 7);
    }

    #[test]
    fn test_running_mean_matches_batch_mean() {
        let samples = [120.0, 340.5, 87.25, 1000.0, 5.0, 412.75];
        let mut metrics = SessionMetrics::default();
        for sample in samples {
            metrics.record_turn(sample);
        }
        #[allow(clippy::cast_precision_loss)]
        let batch = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_eq!(metrics.turn_count, 6);
        assert!((metrics.average_response_time_ms - batch).abs() < 1e-9);
    }

    #[test]
    fn test_merge_only_changes_provided_fields() {
        let mut context = SessionContext {
            subject_name: Some("Ada".to_string()),
            topic: Some("billing".to_string()),
            mood: Mood::Positive,
            should_end_call: false,
        };
        context.merge(ContextAnalysis {
            topic: Some("shipping".to_string()),
            ..ContextAnalysis::default()
        });
        assert_eq!(context.subject_name.as_deref(), Some("Ada"));
        assert_eq!(context.topic.as_deref(), Some("shipping"));
        assert_eq!(context.mood, Mood::Positive);
    }

    #[test]
    fn test_fallback_analysis_resets_to_defaults() {
        let mut context = SessionContext {
            subject_name: Some("Ada".to_string()),
            topic: Some("billing".to_string()),
            mood: Mood::Negative,
            should_end_call: true,
        };
        context.merge(ContextAnalysis::fallback());
        assert_eq!(context.subject_name.as_deref(), Some("Ada"));
        assert_eq!(context.topic.as_deref(), Some("general"));
        assert_eq!(context.mood, Mood::Neutral);
        assert!(!context.should_end_call);
    }

    #[test]
    fn test_mood_parsing() {
        assert_eq!("Positive".parse::<Mood>(), Ok(Mood::Positive));
        assert_eq!(" negative ".parse::<Mood>(), Ok(Mood::Negative));
        assert!("ecstatic".parse::<Mood>().is_err());
    }
}
