//! Shared configuration, errors, and data model.

pub mod config;
pub mod directive;
pub mod errors;
pub mod session;

use std::future::Future;
use std::pin::Pin;

pub use config::{
    AssistantConfig, LlmConfig, ServerConfig, SessionConfig, TelephonyConfig, VoiceConfig,
};
pub use directive::Directive;
pub use errors::{AssistantError, AssistantResult};
pub use session::{
    ContextAnalysis, Mood, Session, SessionContext, SessionMetrics, TokenUsage, Turn,
    TurnMetadata, TurnRole,
};

/// Boxed future returned by downstream client capabilities.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
