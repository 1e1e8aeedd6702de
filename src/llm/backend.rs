use crate::config::{BackendConfig, BackendKind};
use crate::error::{AnalysisError, ProviderFailure};
use crate::llm::ollama::OllamaBackend;
use crate::llm::openai::OpenAiBackend;
use crate::llm::retry::{RetryPolicy, RetryingBackend};
use crate::llm::types::GenerationRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A text-generation service: prompt in, completion text out.
#[async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;

    /// False when the backend needs a credential that was not configured.
    /// Checked before any prompt is sent.
    fn has_credential(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError>;
}

/// Backend for `config`, wrapped in retries when `max_retries > 0`.
pub fn build_backend(config: &BackendConfig) -> Arc<dyn TextBackend> {
    let inner: Arc<dyn TextBackend> = match config.kind {
        BackendKind::OpenAi => Arc::new(OpenAiBackend::from_config(config)),
        BackendKind::Ollama => Arc::new(OllamaBackend::from_config(config)),
    };
    if config.max_retries == 0 {
        return inner;
    }
    Arc::new(RetryingBackend::new(
        inner,
        RetryPolicy {
            max_retries: config.max_retries,
            ..Default::default()
        },
    ))
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Maps a reqwest send/read error onto the provider failure taxonomy.
pub(crate) fn transport_failure(
    backend: &str,
    timeout: Duration,
    error: reqwest::Error,
) -> AnalysisError {
    let failure = if error.is_timeout() {
        ProviderFailure::Timeout(timeout)
    } else {
        ProviderFailure::Transport(error.to_string())
    };
    AnalysisError::provider(backend, failure)
}
