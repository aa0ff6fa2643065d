//! Configuration for the voice assistant.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::common::errors::{AssistantError, AssistantResult};

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "VOXLINE_";

/// Top-level configuration for the assistant.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Session store settings.
    pub session: SessionConfig,
    /// Completion model settings.
    pub llm: LlmConfig,
    /// Speech synthesis settings.
    pub voice: VoiceConfig,
    /// Telephony rendering settings.
    pub telephony: TelephonyConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl AssistantConfig {
    /// Build a configuration from defaults overlaid with `VOXLINE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_parsed("MAX_HISTORY", &mut config.session.max_history);
        override_parsed("IDLE_TIMEOUT_SECONDS", &mut config.session.idle_timeout_seconds);
        override_parsed("SWEEP_INTERVAL_SECONDS", &mut config.session.sweep_interval_seconds);

        override_string("LLM_MODEL", &mut config.llm.model);
        override_string("ANALYSIS_MODEL", &mut config.llm.analysis_model);
        override_parsed("LLM_TEMPERATURE", &mut config.llm.temperature);
        override_parsed("LLM_MAX_TOKENS", &mut config.llm.max_tokens);
        override_parsed("LLM_TIMEOUT_SECONDS", &mut config.llm.request_timeout_seconds);
        if let Some(base_url) = env_value("OLLAMA_URL") {
            config.llm.base_url = Some(base_url);
        }

        override_string("TTS_API_KEY", &mut config.voice.api_key);
        override_string("TTS_VOICE_ID", &mut config.voice.voice_id);
        override_string("TTS_MODEL_ID", &mut config.voice.model_id);
        override_string("TTS_BASE_URL", &mut config.voice.base_url);
        override_parsed("TTS_TIMEOUT_SECONDS", &mut config.voice.request_timeout_seconds);

        override_string("PUBLIC_URL", &mut config.telephony.public_base_url);
        override_string("CALL_VOICE", &mut config.telephony.voice);
        override_string("CALL_LANGUAGE", &mut config.telephony.language);
        override_string("GREETING", &mut config.telephony.greeting);

        override_parsed("PORT", &mut config.server.port);
        override_parsed("AUDIO_CACHE_CAPACITY", &mut config.server.audio_cache_capacity);

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if a value is out of range or invalid, or if a required
    /// credential is missing.
    pub fn validate(&self) -> AssistantResult<()> {
        if self.session.max_history == 0 {
            return Err(AssistantError::InvalidConfig(
                "session.max_history must be > 0".to_string(),
            ));
        }

        if self.session.analysis_window == 0 {
            return Err(AssistantError::InvalidConfig(
                "session.analysis_window must be > 0".to_string(),
            ));
        }

        if self.session.idle_timeout_seconds == 0 || self.session.sweep_interval_seconds == 0 {
            return Err(AssistantError::InvalidConfig(
                "session idle timeout and sweep interval must be > 0".to_string(),
            ));
        }

        if self.llm.request_timeout_seconds == 0 || self.voice.request_timeout_seconds == 0 {
            return Err(AssistantError::InvalidConfig(
                "request timeouts must be > 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 || self.llm.analysis_max_tokens == 0 {
            return Err(AssistantError::InvalidConfig(
                "llm token budgets must be > 0".to_string(),
            ));
        }

        for (name, value) in [
            ("voice.stability", self.voice.stability),
            ("voice.similarity_boost", self.voice.similarity_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssistantError::InvalidConfig(format!(
                    "{name} must be within 0.0..=1.0"
                )));
            }
        }

        if self.voice.api_key.trim().is_empty() {
            return Err(AssistantError::InvalidConfig(format!(
                "speech synthesis api key is missing (set {ENV_PREFIX}TTS_API_KEY)"
            )));
        }

        if self.server.audio_cache_capacity == 0 {
            return Err(AssistantError::InvalidConfig(
                "server.audio_cache_capacity must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }
        Url::parse(&self.voice.base_url)?;
        Url::parse(&self.telephony.public_base_url)?;

        Ok(())
    }
}

/// Session store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of turns kept per session.
    pub max_history: usize,
    /// Idle time after which a session is swept.
    pub idle_timeout_seconds: u64,
    /// Interval between idle sweeps.
    pub sweep_interval_seconds: u64,
    /// Number of most recent turns sent to context analysis.
    pub analysis_window: usize,
}

impl SessionConfig {
    /// Idle threshold as a duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// Sweep interval as a duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: 10,
            idle_timeout_seconds: 60 * 60,
            sweep_interval_seconds: 30 * 60,
            analysis_window: 5,
        }
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model used for replies.
    pub model: String,
    /// Model used for context analysis.
    pub analysis_model: String,
    /// Temperature for replies.
    pub temperature: f64,
    /// Token budget for replies.
    pub max_tokens: u64,
    /// Temperature for context analysis.
    pub analysis_temperature: f64,
    /// Token budget for context analysis.
    pub analysis_max_tokens: u64,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl LlmConfig {
    /// Per-request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            analysis_model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            temperature: 0.7,
            max_tokens: 150,
            analysis_temperature: 0.3,
            analysis_max_tokens: 150,
            base_url: None,
            request_timeout_seconds: 20,
        }
    }
}

/// Speech synthesis settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// API key sent with every synthesis request.
    pub api_key: String,
    /// Voice identifier.
    pub voice_id: String,
    /// Synthesis model identifier.
    pub model_id: String,
    /// Voice stability in `0.0..=1.0`.
    pub stability: f64,
    /// Voice similarity boost in `0.0..=1.0`.
    pub similarity_boost: f64,
    /// Synthesis API base URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl VoiceConfig {
    /// Per-request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_turbo_v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            base_url: "https://api.elevenlabs.io".to_string(),
            request_timeout_seconds: 20,
        }
    }
}

/// Telephony rendering settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Publicly reachable base URL of this server (used for audio links and callbacks).
    pub public_base_url: String,
    /// Path the provider posts speech results to.
    pub gather_path: String,
    /// Built-in provider voice used for plain-text replies.
    pub voice: String,
    /// Speech recognition and synthesis language.
    pub language: String,
    /// Greeting spoken once when a call starts.
    pub greeting: String,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            gather_path: "/voice/process".to_string(),
            voice: "Polly.Joanna".to_string(),
            language: "en-US".to_string(),
            greeting: "Hello! Thanks for calling. How can I help you today?".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Number of synthesized clips kept for playback.
    pub audio_cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::server::DEFAULT_PORT,
            audio_cache_capacity: 256,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn override_string(name: &str, target: &mut String) {
    if let Some(value) = env_value(name) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(name: &str, target: &mut T) {
    if let Some(parsed) = env_value(name).and_then(|value| value.parse().ok()) {
        *target = parsed;
    }
}
