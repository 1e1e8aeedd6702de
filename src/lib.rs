//! # Financial Valuation
//!
//! Normalizes multi-year financial statement disclosures into a canonical
//! per-year dataset, derives ratios and a deterministic multiple-based
//! valuation, and (with the `llm` feature) asks a text-generation backend for
//! a scenario valuation returned as structured data.
//!
//! ## Core Concepts
//!
//! - **Taxonomy resolution**: statement line items labelled under different
//!   accounting standards are mapped onto 15 canonical items
//! - **Aggregation**: one payload per year becomes a [`FinancialDataset`];
//!   missing or malformed years degrade to zeros instead of failing
//! - **Ratios and valuation**: pure functions over the dataset
//! - **Generative valuation**: prompt, backend call and tolerant JSON
//!   extraction behind [`llm::LLMValuationOrchestrator`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_valuation::*;
//!
//! let payload_2023 = StatementPayload::new(vec![
//!     RawStatementRecord::new("ifrs-full_Revenue", "IS", "2,000,000,000"),
//!     RawStatementRecord::new("ifrs-full_ProfitLoss", "IS", "100,000,000"),
//!     RawStatementRecord::new("ifrs-full_Equity", "BS", "500,000,000"),
//! ]);
//!
//! let report = build_report(&[None, Some(payload_2023)], &[2022, 2023], &ValuationConfig::default());
//! println!("{:?}", report.valuation.range);
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod ratios;
pub mod schema;
pub mod taxonomy;
pub mod utils;
pub mod valuation;

#[cfg(feature = "llm")]
pub mod llm;

pub use aggregator::{aggregate, DataAggregator};
pub use config::{BackendConfig, BackendKind, ValuationConfig};
pub use error::{AnalysisError, DataIssue, ProviderFailure, Result, ValuationError};
pub use ratios::{calculate_ratios, RatioEngine, RatioRow, RatioTable, YearRatios};
pub use schema::*;
pub use taxonomy::{
    parse_millions, resolve, AccountTaxonomyTable, TaxonomyEntry, TaxonomyResolver,
    UNITS_PER_MILLION,
};
pub use utils::*;
pub use valuation::*;

use log::info;
use serde::{Deserialize, Serialize};

/// Everything the deterministic pipeline derives for one company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialReport {
    pub dataset: FinancialDataset,
    pub ratios: RatioTable,
    pub valuation: ValuationResult,
    /// Data problems absorbed while aggregating.
    pub issues: Vec<DataIssue>,
}

/// Summary line for a report, e.g. for logs or a dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationHeadline {
    pub reference_year: Option<i32>,
    pub low: String,
    pub high: String,
    pub midpoint: String,
}

impl FinancialReport {
    pub fn headline(&self) -> ValuationHeadline {
        let (low, high) = self.valuation.range;
        let render = |value: f64| {
            if self.valuation.has_range() {
                format_thousands(value)
            } else {
                NOT_AVAILABLE.to_string()
            }
        };
        ValuationHeadline {
            reference_year: self.valuation.reference_year,
            low: render(low),
            high: render(high),
            midpoint: render(self.valuation.midpoint()),
        }
    }
}

/// Aggregates with the standard taxonomy, then computes ratios and valuation.
pub fn build_report(
    yearly_payloads: &[Option<StatementPayload>],
    years: &[i32],
    config: &ValuationConfig,
) -> FinancialReport {
    let (dataset, issues) =
        DataAggregator::default().aggregate_with_diagnostics(yearly_payloads, years);
    let ratios = RatioEngine::ratios(&dataset);
    let valuation = ValuationEngine::new(config.clone()).valuate(&dataset);

    info!(
        "Built report for {} years ({} data issues, valuation {:?})",
        dataset.len(),
        issues.len(),
        valuation.outcome
    );

    FinancialReport {
        dataset,
        ratios,
        valuation,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_report_end_to_end() {
        let payload = StatementPayload::new(vec![
            RawStatementRecord::new("ifrs-full_Revenue", "IS", "2,000,000,000"),
            RawStatementRecord::new("dart_OperatingIncomeLoss", "IS", "50,000,000"),
            RawStatementRecord::new("ifrs-full_ProfitLoss", "IS", "100,000,000"),
            RawStatementRecord::new("ifrs-full_Equity", "BS", "500,000,000"),
        ]);

        let report = build_report(&[None, Some(payload)], &[2022, 2023], &ValuationConfig::default());

        assert_eq!(report.dataset.years, vec![2022, 2023]);
        assert_eq!(report.dataset.revenue, vec![0, 2000]);
        assert_eq!(report.issues, vec![DataIssue::DataUnavailable { year: 2022 }]);
        assert_eq!(report.ratios.revenue_growth, vec!["-", "-"]);
        assert_eq!(report.ratios.net_margin[1], "5.00%");
        assert_eq!(report.valuation.reference_year, Some(2023));

        let headline = report.headline();
        assert_eq!(headline.low, "480");
        assert_eq!(headline.high, "1,500");
        assert_eq!(headline.midpoint, "990");
    }

    #[test]
    fn test_headline_without_estimate() {
        let report = build_report(&[None], &[2023], &ValuationConfig::default());
        assert_eq!(report.valuation.outcome, ValuationOutcome::InsufficientData);
        assert_eq!(report.headline().low, "N/A");
    }
}
