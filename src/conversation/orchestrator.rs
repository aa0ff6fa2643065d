//! Turn-taking conversation loop.
//!
//! One turn walks `Received → HistoryAppended → CompletionRequested →
//! CompletionOk|CompletionFailed → AnalysisRequested → ContextUpdated →
//! SynthesisRequested → SynthesisOk|SynthesisFailed → ResponseRendered`.
//! Downstream failures take a fallback branch; the call is never dropped here.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::common::config::{AssistantConfig, LlmConfig};
use crate::common::directive::Directive;
use crate::common::errors::{AssistantError, AssistantResult};
use crate::common::session::{ContextAnalysis, Session, Turn};
use crate::llm::analyzer::ContextAnalyzer;
use crate::llm::completion::{CompletionClient, CompletionOutput, CompletionRequest};
use crate::prompt::prompt_builder::build_messages;
use crate::prompt::speech_text::SpeechNormalizer;
use crate::session::store::SessionStore;
use crate::voice::audio_store::{AudioRef, AudioStore};
use crate::voice::synthesis::SynthesisClient;

/// Reply used when the completion API fails.
pub const APOLOGY_TEXT: &str =
    "I'm sorry, I'm having trouble answering right now. Could you please say that again?";

/// Stage of a single turn, logged as the turn advances.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TurnStage {
    /// Utterance received.
    Received,
    /// Caller turn appended.
    HistoryAppended,
    /// Completion in flight.
    CompletionRequested,
    /// Completion succeeded.
    CompletionOk,
    /// Completion failed; apology used.
    CompletionFailed,
    /// Context analysis in flight.
    AnalysisRequested,
    /// Analysis merged into the session context.
    ContextUpdated,
    /// Synthesis in flight.
    SynthesisRequested,
    /// Audio available.
    SynthesisOk,
    /// Synthesis failed; provider voice used.
    SynthesisFailed,
    /// Directive returned.
    ResponseRendered,
}

impl TurnStage {
    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::HistoryAppended => "HISTORY_APPENDED",
            Self::CompletionRequested => "COMPLETION_REQUESTED",
            Self::CompletionOk => "COMPLETION_OK",
            Self::CompletionFailed => "COMPLETION_FAILED",
            Self::AnalysisRequested => "ANALYSIS_REQUESTED",
            Self::ContextUpdated => "CONTEXT_UPDATED",
            Self::SynthesisRequested => "SYNTHESIS_REQUESTED",
            Self::SynthesisOk => "SYNTHESIS_OK",
            Self::SynthesisFailed => "SYNTHESIS_FAILED",
            Self::ResponseRendered => "RESPONSE_RENDERED",
        }
    }
}

/// Generation and timing parameters for a turn.
#[derive(Clone, Debug)]
pub struct TurnSettings {
    /// Reply model.
    pub model: String,
    /// Reply temperature.
    pub temperature: f64,
    /// Reply token budget.
    pub max_tokens: u64,
    /// Number of recent turns sent to analysis.
    pub analysis_window: usize,
    /// Budget for each completion or analysis request.
    pub llm_timeout: Duration,
    /// Budget for each synthesis request.
    pub synthesis_timeout: Duration,
}

impl TurnSettings {
    /// Derive settings from the assistant configuration.
    #[must_use]
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self::from_parts(
            &config.llm,
            config.session.analysis_window,
            config.voice.request_timeout(),
        )
    }

    fn from_parts(llm: &LlmConfig, analysis_window: usize, synthesis_timeout: Duration) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            analysis_window,
            llm_timeout: llm.request_timeout(),
            synthesis_timeout,
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&AssistantConfig::default())
    }
}

/// Downstream capabilities used by the orchestrator.
pub struct ConversationDeps {
    /// Completion API.
    pub completion: Arc<dyn CompletionClient>,
    /// Context analyzer.
    pub analyzer: Arc<dyn ContextAnalyzer>,
    /// Speech synthesis API.
    pub synthesis: Arc<dyn SynthesisClient>,
    /// Audio exposure.
    pub audio: Arc<dyn AudioStore>,
}

/// Drives one conversation turn at a time for each call.
pub struct ConversationOrchestrator {
    store: Arc<SessionStore>,
    completion: Arc<dyn CompletionClient>,
    analyzer: Arc<dyn ContextAnalyzer>,
    synthesis: Arc<dyn SynthesisClient>,
    audio: Arc<dyn AudioStore>,
    normalizer: SpeechNormalizer,
    settings: TurnSettings,
}

impl ConversationOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Errors
    /// Returns an error if the speech normalizer rules fail to compile.
    pub fn new(
        store: Arc<SessionStore>,
        deps: ConversationDeps,
        settings: TurnSettings,
    ) -> AssistantResult<Self> {
        Ok(Self {
            store,
            completion: deps.completion,
            analyzer: deps.analyzer,
            synthesis: deps.synthesis,
            audio: deps.audio,
            normalizer: SpeechNormalizer::new()?,
            settings,
        })
    }

    /// Session store shared with the webhook handlers.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Process one caller utterance and decide how to answer.
    ///
    /// An empty or missing utterance yields [`Directive::Reprompt`] without touching
    /// history or any downstream API.
    ///
    /// # Errors
    /// Returns [`AssistantError::InvalidCallId`] for a blank call id. Downstream
    /// failures never surface as errors.
    pub async fn process_turn(
        &self,
        call_id: &str,
        utterance: Option<&str>,
        confidence: f64,
    ) -> AssistantResult<Directive> {
        if call_id.trim().is_empty() {
            return Err(AssistantError::InvalidCallId);
        }

        let started = Instant::now();
        log_stage(call_id, TurnStage::Received);
        let mut session = self.store.get_or_create(call_id);

        let Some(text) = utterance.map(str::trim).filter(|text| !text.is_empty()) else {
            debug!(call_id, "No speech detected, re-prompting");
            return Ok(Directive::Reprompt);
        };

        session.push_turn(Turn::user(text, confidence));
        log_stage(call_id, TurnStage::HistoryAppended);

        let reply = match self.request_completion(&session).await {
            Ok(output) => {
                log_stage(call_id, TurnStage::CompletionOk);
                session.push_turn(Turn::assistant(&output.text, output.model, output.usage));
                output.text
            }
            Err(err) => {
                log_stage(call_id, TurnStage::CompletionFailed);
                warn!(
                    call_id,
                    error = %err,
                    timeout = err.is_timeout(),
                    "Completion failed, apologizing"
                );
                session.metrics.error_count += 1;
                APOLOGY_TEXT.to_string()
            }
        };

        let analysis = self.request_analysis(&session).await;
        session.context.merge(analysis);
        log_stage(call_id, TurnStage::ContextUpdated);

        let spoken = self.normalizer.normalize(&reply);
        let directive = match self.request_speech(call_id, &spoken).await {
            Ok(audio) => {
                log_stage(call_id, TurnStage::SynthesisOk);
                Directive::Audio {
                    url: audio.url,
                    text: spoken,
                }
            }
            Err(err) => {
                log_stage(call_id, TurnStage::SynthesisFailed);
                warn!(call_id, error = %err, "Synthesis failed, using provider voice");
                session.metrics.synthesis_fallbacks += 1;
                Directive::Text { text: spoken }
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        session.metrics.record_turn(elapsed_ms);
        let turn_count = session.metrics.turn_count;
        if !self.store.commit(session) {
            debug!(call_id, "Call ended during the turn; session not written back");
        }

        log_stage(call_id, TurnStage::ResponseRendered);
        info!(
            call_id,
            kind = directive.kind(),
            elapsed_ms,
            turn_count,
            "Turn processed"
        );
        Ok(directive)
    }

    async fn request_completion(&self, session: &Session) -> AssistantResult<CompletionOutput> {
        log_stage(&session.id, TurnStage::CompletionRequested);
        let request = CompletionRequest {
            messages: build_messages(session),
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        with_timeout(
            "completion",
            self.settings.llm_timeout,
            self.completion.complete(request),
        )
        .await
    }

    async fn request_analysis(&self, session: &Session) -> ContextAnalysis {
        log_stage(&session.id, TurnStage::AnalysisRequested);
        let turns = session.recent_turns(self.settings.analysis_window);
        match with_timeout(
            "analysis",
            self.settings.llm_timeout,
            self.analyzer.analyze(turns),
        )
        .await
        {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(call_id = %session.id, error = %err, "Analysis failed, using defaults");
                ContextAnalysis::fallback()
            }
        }
    }

    async fn request_speech(&self, call_id: &str, text: &str) -> AssistantResult<AudioRef> {
        log_stage(call_id, TurnStage::SynthesisRequested);
        let audio = with_timeout(
            "synthesis",
            self.settings.synthesis_timeout,
            self.synthesis.synthesize(text.to_string()),
        )
        .await?;
        self.audio.put(audio).await
    }
}

fn log_stage(call_id: &str, stage: TurnStage) {
    debug!(call_id, stage = stage.as_str(), "Turn stage");
}

async fn with_timeout<T, F>(
    operation: &'static str,
    budget: Duration,
    future: F,
) -> AssistantResult<T>
where
    F: Future<Output = AssistantResult<T>>,
{
    tokio::time::timeout(budget, future)
        .await
        .unwrap_or_else(|_| {
            Err(AssistantError::Timeout {
                operation,
                seconds: budget.as_secs(),
            })
        })
}
