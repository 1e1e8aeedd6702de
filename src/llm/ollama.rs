//! Self-hosted model server backend. No credential is needed.

use crate::config::{BackendConfig, BackendKind};
use crate::error::{AnalysisError, ProviderFailure};
use crate::llm::backend::{http_client, transport_failure, TextBackend};
use crate::llm::types::GenerationRequest;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const NAME: &str = "ollama";

#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaBackend {
    pub fn new(base_url: Option<&str>, model: impl Into<String>) -> Self {
        // Local models may be slow to load.
        let timeout = Duration::from_secs(300);
        Self {
            client: http_client(timeout),
            base_url: base_url
                .unwrap_or(BackendKind::Ollama.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            client: http_client(config.request_timeout()),
            base_url: config.base_url().to_string(),
            model: config.model_name().to_string(),
            timeout: config.request_timeout(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextBackend for OllamaBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        let payload = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: &request.system,
                },
                OllamaMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        debug!("POST {} (model {}, {:?} mode)", url, self.model, request.mode);

        let res = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_failure(NAME, self.timeout, e))?;

        let status = res.status();
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

        let body: OllamaChatResponse = res
            .json()
            .await
            .map_err(|e| transport_failure(NAME, self.timeout, e))?;

        body.message.map(|message| message.content).ok_or_else(|| {
            AnalysisError::provider(
                NAME,
                ProviderFailure::MalformedEnvelope("response has no message".to_string()),
            )
        })
    }
}
