use crate::error::AnalysisError;
use crate::llm::backend::TextBackend;
use crate::llm::types::GenerationRequest;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Doubles with each retry.
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

/// Re-sends a request after transient failures with exponential backoff.
/// Auth and format errors are returned immediately.
pub struct RetryingBackend {
    inner: Arc<dyn TextBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn TextBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl TextBackend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn has_credential(&self) -> bool {
        self.inner.has_credential()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request).await {
                Ok(text) => {
                    if attempt > 0 {
                        info!(
                            "Backend '{}' recovered after {} retries",
                            self.inner.name(),
                            attempt
                        );
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Backend '{}' attempt {}/{} failed: {}. Retrying in {:?}",
                        self.inner.name(),
                        attempt + 1,
                        self.policy.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
