use std::time::Duration;

use async_trait::async_trait;
use lgtm_core::{LgtmError, LlmConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pipeline::TextGenerator;

/// Temperature used when the caller leaves it unset.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use lgtm_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this diff");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// A system instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use lgtm_review::llm::Role;
///
/// assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Sampling options forwarded to Ollama. Unset fields are left to the server.
///
/// # Examples
///
/// ```
/// use lgtm_review::llm::GenerateOptions;
///
/// let opts = GenerateOptions::with_temperature(0.3);
/// let json = serde_json::to_value(opts.resolved()).unwrap();
/// assert_eq!(json["temperature"], serde_json::json!(0.3_f32));
/// assert!(json.get("top_p").is_none());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature; [`DEFAULT_TEMPERATURE`] when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cut-off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

impl GenerateOptions {
    /// Options with only the temperature set.
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Self::default()
        }
    }

    /// Copy with the default temperature filled in.
    pub fn resolved(self) -> Self {
        Self {
            temperature: Some(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            ..self
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Client for a local Ollama server.
///
/// # Examples
///
/// ```
/// use lgtm_core::LlmConfig;
/// use lgtm_review::llm::OllamaClient;
///
/// let client = OllamaClient::new(&LlmConfig::default()).unwrap();
/// assert_eq!(client.model(), "llama2");
/// assert_eq!(client.base_url(), "http://localhost:11434");
/// ```
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LgtmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LgtmError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// Complete `prompt` in one non-streaming request to `/api/generate`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Llm`] on transport errors, non-success statuses,
    /// or a body without a `response` field.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, LgtmError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: options.resolved(),
        };
        debug!(model = %self.config.model, prompt_chars = prompt.chars().count(), "generating");

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| LgtmError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LgtmError::Llm(format!("Ollama error {status}: {body_text}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LgtmError::Llm(format!("failed to parse response: {e}")))?;
        Ok(parsed.response)
    }

    /// Send a conversation to `/api/chat` and return the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Llm`] on transport or response errors.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LgtmError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| LgtmError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LgtmError::Llm(format!("Ollama error {status}: {body_text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LgtmError::Llm(format!("failed to parse response: {e}")))?;
        Ok(parsed.message.content)
    }

    /// `true` when `/api/tags` answers with a success status. Never fails.
    pub async fn check_health(&self) -> bool {
        match self.client.get(self.url("/api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, base_url = %self.base_url(), "Ollama health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LgtmError> {
        OllamaClient::generate(self, prompt, options).await
    }

    async fn check_health(&self) -> bool {
        OllamaClient::check_health(self).await
    }
}
