//! Completion API access and context analysis.

pub mod analyzer;
pub mod completion;

pub use analyzer::{ContextAnalyzer, LlmContextAnalyzer, parse_analysis};
pub use completion::{
    ChatMessage, ChatRole, CompletionClient, CompletionOutput, CompletionRequest,
    OllamaCompletionClient,
};
