//! LLM collaborator backend: sequential model fallback with bounded retry
//!
//! Grounded on the teacher's `OllamaBackend::generate` retry loop,
//! generalized from a single fixed model into §4.8's "sequential attempt
//! over a configured model list; first success wins" and §7's rule that
//! rate-limit errors retry in place while other transient errors fall
//! through to the next model.

use crate::LlmError;
use async_trait::async_trait;
use medirx_core::llm_types::{FinishReason, GenerateRequest, GenerateResponse, Role};
use medirx_core::traits::LanguageModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChatBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Sequential fallback list; first model that succeeds wins.
    pub models: Vec<String>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

/// Chat-completion backend for the LLM Extractor's collaborator call.
/// Speaks an Ollama-compatible `/api/chat` endpoint; any OpenAI-compatible
/// gateway reachable at that shape works without modification.
#[derive(Clone)]
pub struct ChatBackend {
    client: Client,
    config: ChatBackendConfig,
}

impl ChatBackend {
    pub fn new(config: ChatBackendConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }

    async fn call_model(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, LlmError> {
        let body = ChatRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(Into::into).collect(),
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens.map(|t| t as i64),
            },
        };

        let mut req = self.client.post(self.api_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimit);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(LlmError::Network(format!("{status}: {text}")));
            }
            return Err(LlmError::Api(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(GenerateResponse {
            text: parsed.message.content,
            finish_reason: if parsed.done {
                FinishReason::Stop
            } else {
                FinishReason::Length
            },
            usage: None,
        })
    }

    /// Whether the error should be retried against the same model
    /// (rate-limit) rather than falling through to the next configured
    /// model (§7: "distinguishes rate-limit ... from others").
    fn is_rate_limited(err: &LlmError) -> bool {
        matches!(err, LlmError::RateLimit)
    }
}

#[async_trait]
impl LanguageModel for ChatBackend {
    async fn generate(&self, request: GenerateRequest) -> medirx_core::Result<GenerateResponse> {
        let mut last_error: Option<LlmError> = None;

        for model in &self.config.models {
            let mut backoff = self.config.initial_backoff;

            for attempt in 0..=self.config.max_retries {
                if attempt > 0 {
                    tracing::warn!(model, attempt, "llm request rate-limited, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }

                match self.call_model(model, &request).await {
                    Ok(response) => return Ok(response),
                    Err(err) if Self::is_rate_limited(&err) && attempt < self.config.max_retries => {
                        last_error = Some(err);
                    }
                    Err(err) => {
                        tracing::warn!(model, error = %err, "llm model failed, trying next model");
                        last_error = Some(err);
                        break;
                    }
                }
            }
        }

        Err(last_error
            .map(Into::into)
            .unwrap_or_else(|| medirx_core::Error::Extraction("no models configured".to_string())))
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        self.config.models.first().map(String::as_str).unwrap_or("unconfigured")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&medirx_core::llm_types::Message> for ChatMessage {
    fn from(msg: &medirx_core::llm_types::Message) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChatBackendConfig {
        ChatBackendConfig {
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            models: vec!["llama3".to_string(), "qwen2.5".to_string()],
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn model_name_reports_first_configured_model() {
        let backend = ChatBackend::new(config()).unwrap();
        assert_eq!(backend.model_name(), "llama3");
    }

    #[test]
    fn rate_limit_is_retryable_same_model() {
        assert!(ChatBackend::is_rate_limited(&LlmError::RateLimit));
        assert!(!ChatBackend::is_rate_limited(&LlmError::Network("x".into())));
    }
}
