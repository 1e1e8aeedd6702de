//! Hosted chat-completions backend.

use crate::config::{BackendConfig, BackendKind};
use crate::error::{AnalysisError, ProviderFailure};
use crate::llm::backend::{http_client, transport_failure, TextBackend};
use crate::llm::types::GenerationRequest;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const NAME: &str = "openai";

#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(120);
        Self {
            client: http_client(timeout),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: BackendKind::OpenAi.default_base_url().to_string(),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            client: http_client(config.request_timeout()),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            base_url: config.base_url().to_string(),
            model: config.model_name().to_string(),
            timeout: config.request_timeout(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AnalysisError::Auth {
                backend: NAME.to_string(),
            });
        };

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("POST {} (model {}, {:?} mode)", url, self.model, request.mode);

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_failure(NAME, self.timeout, e))?;

        let status = res.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AnalysisError::Auth {
                backend: NAME.to_string(),
            });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AnalysisError::provider(
                NAME,
                ProviderFailure::Status {
                    status: status.as_u16(),
                    body,
                },
            ));
        }

        let body: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| transport_failure(NAME, self.timeout, e))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AnalysisError::provider(
                    NAME,
                    ProviderFailure::MalformedEnvelope("no message content in choices".to_string()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_counts_as_missing() {
        let backend = OpenAiBackend::new(Some("   ".to_string()), "gpt-4o-mini");
        assert!(!backend.has_credential());
        assert!(OpenAiBackend::new(Some("sk-test".to_string()), "gpt-4o-mini").has_credential());
    }

    #[tokio::test]
    async fn test_generate_without_key_is_auth_error() {
        let backend = OpenAiBackend::new(None, "gpt-4o-mini");
        let request = GenerationRequest {
            mode: crate::llm::types::AnalysisMode::Question,
            system: String::new(),
            user: "hello".to_string(),
            temperature: 0.5,
            max_tokens: 10,
        };
        let err = backend.generate(&request).await.unwrap_err();
        assert_eq!(
            err,
            AnalysisError::Auth {
                backend: "openai".to_string()
            }
        );
    }

    #[test]
    fn test_response_envelope_decoding() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"a\": 1}"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("{\"a\": 1}"));
    }
}
