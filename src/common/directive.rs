//! Orchestrator output consumed by the telephony response adapter.

use serde::Serialize;

/// How the telephony layer should answer the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Nothing was heard; listen again.
    Reprompt,
    /// Play synthesized audio, then listen.
    Audio {
        /// Fetchable location of the audio.
        url: String,
        /// Text that was synthesized.
        text: String,
    },
    /// Speak text with the provider voice, then listen.
    Text {
        /// Text to speak.
        text: String,
    },
    /// Unexpected failure: apologize and hang up.
    Error,
}

impl Directive {
    /// Spoken text carried by the directive, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Audio { text, .. } | Self::Text { text } => Some(text),
            Self::Reprompt | Self::Error => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reprompt => "reprompt",
            Self::Audio { .. } => "audio",
            Self::Text { .. } => "text",
            Self::Error => "error",
        }
    }
}
