//! Conversation orchestration.

pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{
    APOLOGY_TEXT, ConversationDeps, ConversationOrchestrator, TurnSettings, TurnStage,
};
