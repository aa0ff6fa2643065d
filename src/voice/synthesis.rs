//! Speech synthesis capability and an ElevenLabs-style HTTP implementation.

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::common::ClientFuture;
use crate::common::config::VoiceConfig;
use crate::common::errors::{AssistantError, AssistantResult};

/// Connection timeout for the synthesis API.
const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Capability: turn text into audio bytes.
pub trait SynthesisClient: Send + Sync {
    /// Synthesize `text`.
    ///
    /// # Errors
    /// Returns an error on non-success status, transport failure or an empty payload.
    fn synthesize(&self, text: String) -> ClientFuture<'_, AssistantResult<Vec<u8>>>;
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// HTTP synthesis client speaking the ElevenLabs text-to-speech API.
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    stability: f64,
    similarity_boost: f64,
}

impl ElevenLabsClient {
    /// Create a client from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &VoiceConfig) -> AssistantResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            voice_id: config.voice_id.clone(),
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id)
    }
}

impl SynthesisClient for ElevenLabsClient {
    fn synthesize(&self, text: String) -> ClientFuture<'_, AssistantResult<Vec<u8>>> {
        Box::pin(async move {
            let body = SynthesisRequest {
                text: &text,
                model_id: &self.model_id,
                voice_settings: VoiceSettings {
                    stability: self.stability,
                    similarity_boost: self.similarity_boost,
                },
            };

            let response = self
                .client
                .post(self.endpoint())
                .header("xi-api-key", &self.api_key)
                .header(reqwest::header::ACCEPT, "audio/mpeg")
                .json(&body)
                .send()
                .await
                .map_err(|err| AssistantError::Synthesis(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AssistantError::Synthesis(format!(
                    "synthesis api returned status {}",
                    status.as_u16()
                )));
            }

            let audio = response
                .bytes()
                .await
                .map_err(|err| AssistantError::Synthesis(err.to_string()))?;
            if audio.is_empty() {
                return Err(AssistantError::Synthesis(
                    "synthesis api returned no audio".to_string(),
                ));
            }

            debug!(bytes = audio.len(), chars = text.len(), "Synthesized speech");
            Ok(audio.to_vec())
        })
    }
}
