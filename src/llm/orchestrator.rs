use crate::config::BackendConfig;
use crate::error::{AnalysisError, ProviderFailure};
use crate::llm::backend::{build_backend, TextBackend};
use crate::llm::cache::SingleFlightCache;
use crate::llm::parser::ResponseParser;
use crate::llm::prompts::PromptBuilder;
use crate::llm::types::{AnalysisEvent, AnalysisMode, GenerationRequest, LLMValuationPayload};
use crate::ratios::RatioEngine;
use crate::schema::{CompanyInfo, FinancialDataset, IndustryInfo, YearRange};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

pub type AnalysisCacheKey = (String, YearRange, AnalysisMode);

/// Results reused across calls for the same company, years and mode.
pub struct AnalysisCache {
    valuations: SingleFlightCache<AnalysisCacheKey, LLMValuationPayload, AnalysisError>,
    narratives: SingleFlightCache<AnalysisCacheKey, String, AnalysisError>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            valuations: SingleFlightCache::new(ttl),
            narratives: SingleFlightCache::new(ttl),
        }
    }

    pub fn clear(&self) {
        self.valuations.clear();
        self.narratives.clear();
    }
}

/// Prompt, backend call and parse for the generative valuation use cases.
pub struct LLMValuationOrchestrator {
    backend: Arc<dyn TextBackend>,
    prompts: PromptBuilder,
    parser: ResponseParser,
    timeout: Duration,
    cache: Option<Arc<AnalysisCache>>,
    progress: Option<Sender<AnalysisEvent>>,
    cancel: Mutex<CancellationToken>,
}

impl LLMValuationOrchestrator {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            backend,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(),
            timeout: Duration::from_secs(120),
            cache: None,
            progress: None,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Backend, timeout and cache as configured.
    pub fn from_config(config: &BackendConfig) -> Self {
        let orchestrator = Self::new(build_backend(config)).with_timeout(config.request_timeout());
        if config.cache_ttl_secs > 0 {
            orchestrator.with_cache(Arc::new(AnalysisCache::new(config.cache_ttl())))
        } else {
            orchestrator
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, progress: Sender<AnalysisEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Releases every running backend call with a cancelled provider error.
    /// Calls started afterwards are unaffected.
    pub fn cancel_in_flight(&self) {
        let mut token = self.cancel.lock().unwrap_or_else(|p| p.into_inner());
        info!("Cancelling in-flight calls to backend '{}'", self.backend.name());
        token.cancel();
        *token = CancellationToken::new();
    }

    /// Scenario valuation as structured data.
    pub async fn analyze_company_value(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        industry: Option<&IndustryInfo>,
    ) -> Result<LLMValuationPayload, AnalysisError> {
        self.ensure_credential().await?;

        let ratios = RatioEngine::ratios(dataset);
        let request = self.prompts.structured(company, dataset, &ratios, industry);
        self.send_event(AnalysisEvent::PromptBuilt { mode: request.mode })
            .await;

        let invocation = self.invocation();
        let parser = self.parser;
        let compute = move || async move {
            let raw = invocation.generate(&request).await?;
            match parser.parse(&raw) {
                Ok(payload) => {
                    invocation.send(AnalysisEvent::Parsed).await;
                    Ok(payload)
                }
                Err(e) => {
                    invocation
                        .send(AnalysisEvent::ParseFailed {
                            reason: e.to_string(),
                        })
                        .await;
                    Err(e)
                }
            }
        };

        match (&self.cache, cache_key(company, dataset, AnalysisMode::Structured)) {
            (Some(cache), Some(key)) => {
                if let Some(hit) = cache.valuations.get(&key) {
                    debug!("Valuation cache hit for {:?}", key);
                    self.send_event(AnalysisEvent::CacheHit).await;
                    return Ok(hit);
                }
                cache.valuations.get_or_compute(key, compute).await
            }
            _ => compute().await,
        }
    }

    /// Comprehensive narrative report, returned as the backend wrote it.
    pub async fn analyze_company_narrative(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        industry: Option<&IndustryInfo>,
    ) -> Result<String, AnalysisError> {
        self.ensure_credential().await?;

        let ratios = RatioEngine::ratios(dataset);
        let request = self.prompts.comprehensive(company, dataset, &ratios, industry);
        self.send_event(AnalysisEvent::PromptBuilt { mode: request.mode })
            .await;

        let invocation = self.invocation();
        let compute = move || async move { invocation.generate(&request).await };

        match (&self.cache, cache_key(company, dataset, AnalysisMode::Comprehensive)) {
            (Some(cache), Some(key)) => {
                if let Some(hit) = cache.narratives.get(&key) {
                    debug!("Narrative cache hit for {:?}", key);
                    self.send_event(AnalysisEvent::CacheHit).await;
                    return Ok(hit);
                }
                cache.narratives.get_or_compute(key, compute).await
            }
            _ => compute().await,
        }
    }

    /// Answer to a free-form question, unparsed and never cached.
    pub async fn analyze_investment_potential(
        &self,
        company: &CompanyInfo,
        dataset: &FinancialDataset,
        question: &str,
    ) -> Result<String, AnalysisError> {
        self.ensure_credential().await?;

        let request = self.prompts.question(company, dataset, question);
        self.send_event(AnalysisEvent::PromptBuilt { mode: request.mode })
            .await;

        self.invocation().generate(&request).await
    }

    async fn ensure_credential(&self) -> Result<(), AnalysisError> {
        if self.backend.has_credential() {
            return Ok(());
        }
        let backend = self.backend.name().to_string();
        warn!("No credential configured for backend '{}'", backend);
        self.send_event(AnalysisEvent::AuthFailed {
            backend: backend.clone(),
        })
        .await;
        Err(AnalysisError::Auth { backend })
    }

    fn invocation(&self) -> Invocation {
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        Invocation {
            backend: Arc::clone(&self.backend),
            timeout: self.timeout,
            token,
            progress: self.progress.clone(),
        }
    }

    async fn send_event(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}

fn cache_key(
    company: &CompanyInfo,
    dataset: &FinancialDataset,
    mode: AnalysisMode,
) -> Option<AnalysisCacheKey> {
    let company_id = company.company_id.as_deref()?.trim();
    if company_id.is_empty() {
        return None;
    }
    Some((company_id.to_string(), YearRange::of(dataset)?, mode))
}

/// Everything one backend call needs, owned so it can outlive the caller
/// when other waiters share the computation.
struct Invocation {
    backend: Arc<dyn TextBackend>,
    timeout: Duration,
    token: CancellationToken,
    progress: Option<Sender<AnalysisEvent>>,
}

impl Invocation {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AnalysisError> {
        let name = self.backend.name().to_string();
        self.send(AnalysisEvent::BackendInvoked {
            backend: name.clone(),
        })
        .await;
        info!("Invoking backend '{}' ({:?} mode)", name, request.mode);

        let started = Instant::now();
        let outcome = tokio::select! {
            _ = self.token.cancelled() => {
                Err(AnalysisError::provider(&name, ProviderFailure::Cancelled))
            }
            result = tokio::time::timeout(self.timeout, self.backend.generate(request)) => {
                result.unwrap_or_else(|_| {
                    Err(AnalysisError::provider(&name, ProviderFailure::Timeout(self.timeout)))
                })
            }
        };

        match &outcome {
            Ok(text) => info!(
                "Backend '{}' answered in {:?} ({} chars)",
                name,
                started.elapsed(),
                text.len()
            ),
            Err(AnalysisError::Auth { backend }) => {
                warn!("Backend '{}' rejected the credential", backend);
                self.send(AnalysisEvent::AuthFailed {
                    backend: backend.clone(),
                })
                .await;
            }
            Err(e) => {
                warn!("Backend '{}' failed after {:?}: {}", name, started.elapsed(), e);
                self.send(AnalysisEvent::ProviderFailed {
                    reason: e.to_string(),
                })
                .await;
            }
        }
        outcome
    }

    async fn send(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}
