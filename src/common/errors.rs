//! Error types for the voice assistant.

use thiserror::Error;

/// Voice assistant error type.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Invalid configuration or missing credentials.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Call identifier was empty.
    #[error("invalid call id")]
    InvalidCallId,
    /// Completion API returned an unusable result.
    #[error("completion failed: {0}")]
    Completion(String),
    /// Context analysis could not be produced.
    #[error("context analysis failed: {0}")]
    Analysis(String),
    /// Speech synthesis API failed or returned no audio.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    /// A downstream request exceeded its time budget.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Name of the downstream operation.
        operation: &'static str,
        /// Configured budget in seconds.
        seconds: u64,
    },
    /// Audio bytes could not be stored or exposed.
    #[error("audio store error: {0}")]
    AudioStore(String),
    /// HTTP client error.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    /// Completion error from Rig.
    #[error("llm completion error: {0}")]
    Llm(#[from] rig::completion::CompletionError),
    /// HTTP client error from Rig.
    #[error("llm client error: {0}")]
    LlmClient(#[from] rig::http_client::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl AssistantError {
    /// Check if this error came from an elapsed request timer.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Convenience result alias for assistant operations.
pub type AssistantResult<T> = Result<T, AssistantError>;
