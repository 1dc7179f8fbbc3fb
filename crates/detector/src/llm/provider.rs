use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionResponseFormat,
        ChatCompletionResponseFormatType, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: String,
    pub model: String,
    pub total_tokens: u32,
}

/// Opaque text-in/text-out analysis capability. Implementations may suspend
/// on I/O and may fail; the batch processor treats any failure as a
/// recoverable per-batch error.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn analyze(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;

    fn model_name(&self) -> &str;

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}

/// OpenAI-backed provider. The API key is injected explicitly by the caller
/// (the CLI reads the environment exactly once at startup); no component
/// below this point touches ambient configuration.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout_seconds: u64,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
            timeout_seconds: 120,
            max_retries: 3,
        }
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
            model,
            timeout_seconds: 120,
            max_retries: 3,
        }
    }

    /// Overrides the request timeout and retry budget, normally from
    /// [`DetectorConfig`](crate::config::DetectorConfig).
    pub fn with_limits(mut self, timeout_seconds: u64, max_retries: u32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self.max_retries = max_retries;
        self
    }
}

fn classify_api_error(e: OpenAIError) -> ModelError {
    match e {
        OpenAIError::Reqwest(inner) => ModelError::Network(inner.to_string()),
        other => {
            let msg = other.to_string();
            if msg.to_lowercase().contains("rate limit") || msg.contains("rate_limit") {
                ModelError::RateLimit
            } else {
                ModelError::Api(msg)
            }
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn analyze(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        debug!(model = %self.model, "sending analysis request");

        let system_message = ChatCompletionRequestSystemMessage {
            content: request.system_prompt.clone(),
            ..Default::default()
        };
        let user_message = ChatCompletionRequestUserMessage {
            content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                request.user_prompt.clone(),
            ),
            ..Default::default()
        };

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_message),
                ChatCompletionRequestMessage::User(user_message),
            ])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens as u16)
            .response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            })
            .build()
            .map_err(|e| ModelError::Api(e.to_string()))?;

        let mut attempt = 0;
        let response = loop {
            attempt += 1;

            let call = tokio::time::timeout(
                Duration::from_secs(self.timeout_seconds),
                self.client.chat().create(api_request.clone()),
            )
            .await;

            match call {
                Ok(Ok(response)) => break response,
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "model API call failed");
                    let err = classify_api_error(e);
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let wait = if matches!(err, ModelError::RateLimit) {
                        Duration::from_secs(2_u64.pow(attempt))
                    } else {
                        Duration::from_millis(200 * attempt as u64)
                    };
                    tokio::time::sleep(wait).await;
                }
                Err(_) => {
                    warn!(attempt, "model API call timed out");
                    if attempt >= self.max_retries {
                        return Err(ModelError::Timeout(self.timeout_seconds));
                    }
                }
            }
        };

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ModelError::InvalidResponse("no content in response".to_string()))?;

        let total_tokens = response.usage.map(|u| u.total_tokens).unwrap_or_default();
        debug!(total_tokens, "received model response");

        Ok(ModelResponse {
            content,
            model: response.model,
            total_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_configurable() {
        let provider =
            OpenAiProvider::new("key".to_string(), "gpt-4o".to_string()).with_limits(30, 5);
        assert_eq!(provider.timeout_seconds, 30);
        assert_eq!(provider.max_retries, 5);
    }

    #[test]
    fn test_rate_limit_failures_are_classified() {
        let err = classify_api_error(OpenAIError::StreamError(
            "rate limit exceeded".to_string(),
        ));
        assert!(matches!(err, ModelError::RateLimit));
    }

    #[test]
    fn test_other_failures_surface_as_api_errors() {
        let err = classify_api_error(OpenAIError::InvalidArgument("bad request".to_string()));
        assert!(matches!(err, ModelError::Api(_)));
    }
}
