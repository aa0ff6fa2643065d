//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::common::config::AssistantConfig;
use crate::common::errors::AssistantResult;
use crate::conversation::{ConversationDeps, ConversationOrchestrator, TurnSettings};
use crate::llm::{CompletionClient, LlmContextAnalyzer, OllamaCompletionClient};
use crate::session::SessionStore;
use crate::telephony::{TelephonyRenderer, TwimlRenderer};
use crate::voice::{AudioStore, ElevenLabsClient, InMemoryAudioStore};

/// Shared application state.
pub struct AppState {
    /// Active call sessions.
    pub store: Arc<SessionStore>,
    /// Turn processing.
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Call-flow markup.
    pub renderer: Arc<dyn TelephonyRenderer>,
    /// Synthesized clips served to the provider.
    pub audio: Arc<dyn AudioStore>,
}

impl AppState {
    /// Wire the production clients from configuration.
    ///
    /// # Errors
    /// Returns an error if a client cannot be built from the configuration.
    pub fn new(config: &AssistantConfig) -> AssistantResult<Arc<Self>> {
        let store = Arc::new(SessionStore::new(&config.session));
        let completion: Arc<dyn CompletionClient> =
            Arc::new(OllamaCompletionClient::new(&config.llm)?);
        let analyzer = Arc::new(LlmContextAnalyzer::new(Arc::clone(&completion), &config.llm));
        let synthesis = Arc::new(ElevenLabsClient::new(&config.voice)?);
        let audio: Arc<dyn AudioStore> = Arc::new(InMemoryAudioStore::new(
            &config.telephony.public_base_url,
            config.server.audio_cache_capacity,
        )?);

        let deps = ConversationDeps {
            completion,
            analyzer,
            synthesis,
            audio: Arc::clone(&audio),
        };
        let settings = TurnSettings::from_config(config);
        let orchestrator = ConversationOrchestrator::new(Arc::clone(&store), deps, settings)?;

        Ok(Self::with_components(
            Arc::new(orchestrator),
            Arc::new(TwimlRenderer::new(&config.telephony)),
            audio,
        ))
    }

    /// Assemble state from already-built components.
    #[must_use]
    pub fn with_components(
        orchestrator: Arc<ConversationOrchestrator>,
        renderer: Arc<dyn TelephonyRenderer>,
        audio: Arc<dyn AudioStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::clone(orchestrator.store()),
            orchestrator,
            renderer,
            audio,
        })
    }
}
