//! Prompt construction and spoken-text normalization.

pub mod prompt_builder;
pub mod speech_text;

pub use prompt_builder::{build_messages, build_system_prompt};
pub use speech_text::SpeechNormalizer;
