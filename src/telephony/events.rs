//! Inbound webhook events from the telephony provider.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Call status reported by the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallStatus {
    /// Call is being placed.
    Ringing,
    /// Call is connected.
    InProgress,
    /// Caller or assistant hung up normally.
    Completed,
    /// Call could not be connected.
    Failed,
    /// Line was busy.
    Busy,
    /// Nobody answered.
    NoAnswer,
}

impl CallStatus {
    /// Provider string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
        }
    }

    /// Whether this status ends the call.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Busy | Self::NoAnswer
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ringing" | "queued" | "initiated" => Ok(Self::Ringing),
            "in-progress" | "answered" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" | "canceled" => Ok(Self::Failed),
            "busy" => Ok(Self::Busy),
            "no-answer" => Ok(Self::NoAnswer),
            other => Err(other.to_string()),
        }
    }
}

/// Call start webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct CallStartEvent {
    /// Call identifier.
    #[serde(rename = "CallSid")]
    pub call_id: String,
    /// Caller number.
    #[serde(rename = "From", default)]
    pub from_number: Option<String>,
    /// Dialed number.
    #[serde(rename = "To", default)]
    pub to_number: Option<String>,
}

/// Speech recognition result webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct SpeechEvent {
    /// Call identifier.
    #[serde(rename = "CallSid")]
    pub call_id: String,
    /// Recognized text; absent when nothing was heard.
    #[serde(rename = "SpeechResult", default)]
    pub utterance: Option<String>,
    /// Recognition confidence as sent by the provider.
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<String>,
}

impl SpeechEvent {
    /// Confidence as a number; `0.0` when absent or unparseable.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        parse_confidence(self.confidence.as_deref())
    }
}

/// Call status change webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct StatusEvent {
    /// Call identifier.
    #[serde(rename = "CallSid")]
    pub call_id: String,
    /// Raw status string.
    #[serde(rename = "CallStatus")]
    pub status: String,
    /// Call length in seconds, sent with terminal statuses.
    #[serde(rename = "CallDuration", default)]
    pub duration_seconds: Option<String>,
}

impl StatusEvent {
    /// Parsed status, if recognized.
    #[must_use]
    pub fn call_status(&self) -> Option<CallStatus> {
        self.status.parse().ok()
    }

    /// Parsed duration, if present.
    #[must_use]
    pub fn duration(&self) -> Option<u64> {
        self.duration_seconds
            .as_deref()
            .and_then(|value| value.trim().parse().ok())
    }
}

/// Parse a confidence value, falling back to `0.0`.
#[must_use]
pub fn parse_confidence(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
