use crate::error::{Result, ValuationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Industry multiples used by the deterministic valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    #[serde(default = "default_per_multiple")]
    pub per_multiple: f64,
    #[serde(default = "default_ebitda_multiple")]
    pub ebitda_multiple: f64,
}

fn default_per_multiple() -> f64 {
    15.0
}

fn default_ebitda_multiple() -> f64 {
    8.0
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            per_multiple: default_per_multiple(),
            ebitda_multiple: default_ebitda_multiple(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted chat-completions API.
    #[default]
    OpenAi,
    /// Self-hosted model server.
    Ollama,
}

impl BackendKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "hosted" => Ok(BackendKind::OpenAi),
            "ollama" | "local" => Ok(BackendKind::Ollama),
            other => Err(ValuationError::InvalidConfig(format!(
                "unknown backend '{}', expected 'openai' or 'ollama'",
                other
            ))),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            BackendKind::OpenAi => "gpt-4o-mini",
            BackendKind::Ollama => "llama3",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            BackendKind::OpenAi => "https://api.openai.com",
            BackendKind::Ollama => "http://localhost:11434",
        }
    }
}

/// Settings for the text-generation backend.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long a generated valuation is reused for the same company and years.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .finish()
    }
}

impl BackendConfig {
    /// Reads `VALUATION_BACKEND`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `OLLAMA_BASE_URL`, `VALUATION_MODEL`, `VALUATION_TIMEOUT_SECS` and
    /// `VALUATION_MAX_RETRIES`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let kind = match non_empty("VALUATION_BACKEND") {
            Some(name) => BackendKind::parse(&name)?,
            None => BackendKind::default(),
        };

        let base_url = match kind {
            BackendKind::OpenAi => non_empty("OPENAI_BASE_URL"),
            BackendKind::Ollama => non_empty("OLLAMA_BASE_URL"),
        };

        let mut config = Self {
            kind,
            api_key: non_empty("OPENAI_API_KEY"),
            base_url,
            model: non_empty("VALUATION_MODEL"),
            ..Default::default()
        };

        if let Some(raw) = non_empty("VALUATION_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("VALUATION_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = non_empty("VALUATION_MAX_RETRIES") {
            config.max_retries = parse_number("VALUATION_MAX_RETRIES", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ValuationError::InvalidConfig(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ValuationError::InvalidConfig(format!("{} must be a number, got '{}'", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = BackendConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.kind, BackendKind::OpenAi);
        assert_eq!(config.api_key, None);
        assert_eq!(config.model_name(), "gpt-4o-mini");
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_ollama_from_environment() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("VALUATION_BACKEND", "ollama"),
            ("OLLAMA_BASE_URL", "http://gpu-box:11434/"),
            ("VALUATION_MODEL", "qwen2"),
            ("VALUATION_TIMEOUT_SECS", "300"),
        ]))
        .unwrap();
        assert_eq!(config.kind, BackendKind::Ollama);
        assert_eq!(config.base_url(), "http://gpu-box:11434");
        assert_eq!(config.model_name(), "qwen2");
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(BackendConfig::from_lookup(lookup(&[("VALUATION_BACKEND", "gemini")])).is_err());
        assert!(BackendConfig::from_lookup(lookup(&[("VALUATION_TIMEOUT_SECS", "soon")])).is_err());
        assert!(BackendConfig::from_lookup(lookup(&[("VALUATION_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_api_key_is_masked_in_debug_output() {
        let config = BackendConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_valuation_config_deserializes_with_defaults() {
        let config: ValuationConfig = serde_json::from_str(r#"{"per_multiple": 12}"#).unwrap();
        assert_eq!(config.per_multiple, 12.0);
        assert_eq!(config.ebitda_multiple, 8.0);
    }
}
