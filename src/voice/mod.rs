//! Speech synthesis and audio exposure.

pub mod audio_store;
pub mod synthesis;

pub use audio_store::{AudioRef, AudioStore, InMemoryAudioStore};
pub use synthesis::{ElevenLabsClient, SynthesisClient};
