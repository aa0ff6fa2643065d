//! Completion API capability and its Ollama implementation through Rig.

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient as _;
use rig::completion::CompletionModel as _;
use rig::message::{AssistantContent, Message};
use rig::providers::ollama;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::ClientFuture;
use crate::common::config::LlmConfig;
use crate::common::errors::{AssistantError, AssistantResult};
use crate::common::session::TokenUsage;

/// Role of a chat message sent to the completion API.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// Caller message.
    User,
    /// Assistant message.
    Assistant,
}

/// One role/content pair.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a message.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Messages plus generation parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Ordered messages, system first.
    pub messages: Vec<ChatMessage>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Token budget.
    pub max_tokens: u64,
}

/// Generated text with usage accounting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionOutput {
    /// Generated text.
    pub text: String,
    /// Token usage.
    pub usage: TokenUsage,
    /// Model that answered.
    pub model: String,
}

/// Capability: request a chat completion.
pub trait CompletionClient: Send + Sync {
    /// Complete a conversation.
    ///
    /// # Errors
    /// Returns an error on any non-success status, transport failure or empty output.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> ClientFuture<'_, AssistantResult<CompletionOutput>>;
}

/// Ollama completion client using the Rig provider.
pub struct OllamaCompletionClient {
    client: ollama::Client<ReqwestClient>,
}

impl OllamaCompletionClient {
    /// Create a client from config.
    ///
    /// # Errors
    /// Returns an error if the client cannot be built.
    pub fn new(config: &LlmConfig) -> AssistantResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(AssistantError::from)?;
        Ok(Self { client })
    }
}

impl CompletionClient for OllamaCompletionClient {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> ClientFuture<'_, AssistantResult<CompletionOutput>> {
        Box::pin(async move {
            let parts = split_messages(request.messages)?;
            let model = self.client.completion_model(request.model.clone());

            debug!(
                model = %request.model,
                history = parts.history.len(),
                "Requesting completion"
            );

            let mut builder = model
                .completion_request(parts.prompt)
                .temperature(request.temperature)
                .max_tokens(request.max_tokens)
                .messages(parts.history);
            if let Some(preamble) = parts.preamble {
                builder = builder.preamble(preamble);
            }

            let response = model.completion(builder.build()).await?;
            let text = extract_text(&response.choice);
            let text = text.trim();
            if text.is_empty() {
                return Err(AssistantError::Completion(
                    "model returned no text".to_string(),
                ));
            }

            let served_by = if response.raw_response.model.is_empty() {
                request.model
            } else {
                response.raw_response.model
            };

            Ok(CompletionOutput {
                text: text.to_string(),
                usage: TokenUsage {
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                    total_tokens: response.usage.total_tokens,
                },
                model: served_by,
            })
        })
    }
}

/// Messages rearranged into Rig's preamble / history / prompt shape.
struct RigParts {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: String,
}

fn split_messages(messages: Vec<ChatMessage>) -> AssistantResult<RigParts> {
    let mut system = Vec::new();
    let mut dialogue = Vec::new();
    for message in messages {
        match message.role {
            ChatRole::System => system.push(message.content),
            ChatRole::User | ChatRole::Assistant => dialogue.push(message),
        }
    }

    let prompt = match dialogue.pop() {
        Some(last) if last.role == ChatRole::User => last.content,
        _ => {
            return Err(AssistantError::Completion(
                "conversation must end with a caller message".to_string(),
            ));
        }
    };

    let history = dialogue
        .into_iter()
        .map(|message| match message.role {
            ChatRole::Assistant => Message::assistant(message.content),
            ChatRole::User | ChatRole::System => Message::user(message.content),
        })
        .collect();

    let preamble = if system.is_empty() {
        None
    } else {
        Some(system.join("\n"))
    };

    Ok(RigParts {
        preamble,
        history,
        prompt,
    })
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_moves_last_user_message_to_prompt() {
        let parts = split_messages(vec![
            ChatMessage::new(ChatRole::System, "be brief"),
            ChatMessage::new(ChatRole::User, "hello"),
            ChatMessage::new(ChatRole::Assistant, "hi"),
            ChatMessage::new(ChatRole::User, "what time is it"),
        ])
        .unwrap();

        assert_eq!(parts.preamble.as_deref(), Some("be brief"));
        assert_eq!(parts.prompt, "what time is it");
        assert_eq!(parts.history.len(), 2);
    }

    #[test]
    fn test_split_rejects_trailing_assistant_message() {
        let result = split_messages(vec![
            ChatMessage::new(ChatRole::User, "hello"),
            ChatMessage::new(ChatRole::Assistant, "hi"),
        ]);
        assert!(matches!(result, Err(AssistantError::Completion(_))));
    }

    #[test]
    fn test_split_rejects_empty_dialogue() {
        let result = split_messages(vec![ChatMessage::new(ChatRole::System, "only system")]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_complete_reports_model_that_answered() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "ministral-3:8b-instruct-2512-q4_K_M",
                "created_at": "2026-10-17T09:30:00Z",
                "message": { "role": "assistant", "content": " Sure, one moment. " },
                "done": true,
                "prompt_eval_count": 40,
                "eval_count": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaCompletionClient::new(&LlmConfig {
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        })
        .unwrap();
        let output = client
            .complete(CompletionRequest {
                messages: vec![
                    ChatMessage::new(ChatRole::System, "be brief"),
                    ChatMessage::new(ChatRole::User, "hold on"),
                ],
                model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
                temperature: 0.7,
                max_tokens: 150,
            })
            .await
            .unwrap();

        assert_eq!(output.text, "Sure, one moment.");
        assert_eq!(output.model, "ministral-3:8b-instruct-2512-q4_K_M");
        assert_eq!(output.usage.input_tokens, 40);
        assert_eq!(output.usage.output_tokens, 5);
    }

    #[test]
    fn test_client_builds_with_custom_base_url() {
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:11434".to_string()),
            ..LlmConfig::default()
        };
        assert!(OllamaCompletionClient::new(&config).is_ok());
    }
}
