use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("Invalid dataset: series '{series}' has {actual} values but there are {expected} years")]
    InvalidDataset {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid year range {start}..={end}: start must not be after end")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ValuationError>;

/// Data problems that are recovered locally during aggregation.
///
/// These never fail a call; they are logged and, on request, handed back
/// alongside the dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DataIssue {
    #[error("No statement data for {year}; every item defaults to 0")]
    DataUnavailable { year: i32 },

    #[error("Unparseable amount {raw:?} for account '{account_id}' in {year}")]
    NumericParse {
        year: i32,
        account_id: String,
        raw: Option<String>,
    },
}

/// Why a backend call did not produce text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),
}

impl ProviderFailure {
    /// Transient failures that are worth re-sending the same prompt for.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderFailure::Transport(_) | ProviderFailure::Timeout(_) => true,
            ProviderFailure::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderFailure::Cancelled | ProviderFailure::MalformedEnvelope(_) => false,
        }
    }
}

/// Failures surfaced by the generative valuation path.
///
/// `Clone` because a single in-flight computation hands its outcome to every
/// caller waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No credential configured for backend '{backend}'")]
    Auth { backend: String },

    #[error("Backend '{backend}' failed: {failure}")]
    Provider {
        backend: String,
        failure: ProviderFailure,
    },

    #[error("Backend response is not a valid valuation payload: {reason}")]
    ResponseFormat {
        reason: String,
        /// The backend output exactly as received.
        raw_response: String,
    },
}

impl AnalysisError {
    pub fn provider(backend: impl Into<String>, failure: ProviderFailure) -> Self {
        AnalysisError::Provider {
            backend: backend.into(),
            failure,
        }
    }

    /// Raw backend text for format failures, so it can be shown for manual inspection.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AnalysisError::ResponseFormat { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::Provider { failure, .. } if failure.is_retryable())
    }
}
