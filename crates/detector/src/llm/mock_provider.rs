//! Scripted provider for tests: canned responses keyed by prompt content or
//! played back in sequence, with call counting and failure modes.

use crate::llm::provider::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockProvider {
    keyed_responses: Vec<(String, String)>,
    sequence: Mutex<Vec<Result<String, String>>>,
    default_response: String,
    call_count: AtomicUsize,
    should_fail: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            keyed_responses: Vec::new(),
            sequence: Mutex::new(Vec::new()),
            default_response: r#"{"summary":"No VM machinery detected","regions":[]}"#.to_string(),
            call_count: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    /// Provider whose every call fails, for exercising per-batch error paths.
    pub fn failing() -> Self {
        let mut provider = Self::new();
        provider.should_fail = true;
        provider
    }

    /// Returns `response` whenever the user prompt contains `pattern`.
    pub fn with_response(mut self, pattern: &str, response: &str) -> Self {
        self.keyed_responses
            .push((pattern.to_string(), response.to_string()));
        self
    }

    /// Plays back responses in call order, before keyed lookup. An `Err`
    /// entry makes that single call fail.
    pub fn with_sequence(self, responses: Vec<Result<String, String>>) -> Self {
        {
            let mut seq = self.sequence.lock().unwrap();
            *seq = responses;
            seq.reverse();
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn analyze(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(ModelError::Api(
                "mock provider configured to fail".to_string(),
            ));
        }

        if let Some(scripted) = self.sequence.lock().unwrap().pop() {
            return match scripted {
                Ok(content) => Ok(ModelResponse {
                    content,
                    model: "mock-model".to_string(),
                    total_tokens: 100,
                }),
                Err(msg) => Err(ModelError::Api(msg)),
            };
        }

        let content = self
            .keyed_responses
            .iter()
            .find(|(pattern, _)| request.user_prompt.contains(pattern))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(ModelResponse {
            content,
            model: "mock-model".to_string(),
            total_tokens: 100,
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_prompt: &str) -> ModelRequest {
        ModelRequest {
            system_prompt: "system".to_string(),
            user_prompt: user_prompt.to_string(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_keyed_response_and_call_count() {
        let provider = MockProvider::new()
            .with_response("while (true)", r#"{"summary":"dispatcher","regions":[]}"#);

        let hit = provider.analyze(request("10: while (true) {")).await.unwrap();
        assert!(hit.content.contains("dispatcher"));

        let miss = provider.analyze(request("1: var a;")).await.unwrap();
        assert!(miss.content.contains("No VM machinery"));

        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_sequenced_responses() {
        let provider = MockProvider::new().with_sequence(vec![
            Ok(r#"{"summary":"first","regions":[]}"#.to_string()),
            Err("transient failure".to_string()),
        ]);

        let first = provider.analyze(request("x")).await.unwrap();
        assert!(first.content.contains("first"));

        let second = provider.analyze(request("x")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_failing_provider() {
        let provider = MockProvider::failing();
        assert!(provider.analyze(request("x")).await.is_err());
    }
}
