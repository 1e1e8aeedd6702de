use log::warn;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One figure under the three valuation scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioValues {
    #[schemars(description = "Value under pessimistic assumptions")]
    pub conservative: f64,
    #[schemars(description = "Value under the most likely assumptions")]
    pub base: f64,
    #[schemars(description = "Value under favourable assumptions")]
    pub optimistic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValuationAssumptions {
    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "EV/EBITDA multiple applied in each scenario")]
    pub ebitda_multipliers: Option<ScenarioValues>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "DCF discount rate (WACC) in percent per scenario")]
    pub discount_rates: Option<ScenarioValues>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Annual cash flow growth rate in percent during the forecast period")]
    pub growth_rates: Option<ScenarioValues>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Perpetual growth rate in percent after the forecast period")]
    pub terminal_growth_rates: Option<ScenarioValues>,

    /// Keys the backend added beyond the ones above.
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValuationCalculations {
    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Average EBITDA used as the basis of the multiple method, in millions")]
    pub average_ebitda: Option<f64>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "How the EBITDA valuation was derived")]
    pub ebitda_description: Option<String>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "How the DCF valuation was derived")]
    pub dcf_description: Option<String>,

    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Optional sections and fields that do not decode are dropped with a warning
/// instead of failing the whole payload.
fn optional_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!("Ignoring malformed optional valuation field: {}", e);
            Ok(None)
        }
    }
}

/// Scenario valuation returned by a backend in structured mode.
///
/// Only `company` and the two scenario valuations are required. The other
/// sections may be absent or malformed; either way they read as unknown,
/// never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LLMValuationPayload {
    #[schemars(description = "Company name")]
    pub company: String,

    #[schemars(description = "Enterprise value from the EBITDA multiple method, in millions")]
    pub ebitda_valuation: ScenarioValues,

    #[schemars(description = "Enterprise value from a discounted cash flow estimate, in millions")]
    pub dcf_valuation: ScenarioValues,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<ValuationAssumptions>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    pub calculations: Option<ValuationCalculations>,

    #[serde(default, deserialize_with = "optional_or_none", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Short overall assessment")]
    pub summary: Option<String>,
}

impl LLMValuationPayload {
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(LLMValuationPayload)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }

    /// Mean of the two base-case values.
    pub fn base_average(&self) -> f64 {
        (self.ebitda_valuation.base + self.dcf_valuation.base) / 2.0
    }
}

/// Which kind of request a prompt represents; also part of cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Narrative M&A report.
    Comprehensive,
    /// Strict JSON scenario valuation.
    Structured,
    /// Free-form answer to a caller question.
    Question,
}

/// Progress of one orchestrator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisEvent {
    PromptBuilt { mode: AnalysisMode },
    BackendInvoked { backend: String },
    CacheHit,
    Parsed,
    ParseFailed { reason: String },
    ProviderFailed { reason: String },
    AuthFailed { backend: String },
}

/// Everything a backend needs to produce one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mode: AnalysisMode,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}
