use crate::config::ValuationConfig;
use crate::schema::{CanonicalItem, FinancialDataset};
use crate::utils::{format_thousands, NOT_AVAILABLE};
use log::info;
use serde::{Deserialize, Serialize};

/// Operating profit is scaled by this to stand in for EBITDA. Illustrative
/// only; depreciation and amortization are not disclosed in the dataset.
pub const EBITDA_PROXY_FACTOR: f64 = 1.2;

pub const INSUFFICIENT_DATA_LABEL: &str = "insufficient data";
pub const PER_LABEL: &str = "PER-based value";
pub const EBITDA_LABEL: &str = "EBITDA multiple value";
pub const NET_ASSET_LABEL: &str = "Net asset value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationOutcome {
    Estimated,
    /// No year had positive net income or operating profit.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMethod {
    pub label: String,
    /// Millions; `None` renders as "N/A".
    pub estimated_value: Option<f64>,
}

impl ValuationMethod {
    pub fn display_value(&self) -> String {
        self.estimated_value
            .map(format_thousands)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub outcome: ValuationOutcome,
    pub reference_year: Option<i32>,
    pub methods: Vec<ValuationMethod>,
    /// `(min, max)` over the strictly positive estimates, `(0, 0)` if there are none.
    pub range: (f64, f64),
}

impl ValuationResult {
    fn insufficient_data() -> Self {
        Self {
            outcome: ValuationOutcome::InsufficientData,
            reference_year: None,
            methods: vec![ValuationMethod {
                label: INSUFFICIENT_DATA_LABEL.to_string(),
                estimated_value: None,
            }],
            range: (0.0, 0.0),
        }
    }

    pub fn has_range(&self) -> bool {
        self.range.0 > 0.0 || self.range.1 > 0.0
    }

    pub fn midpoint(&self) -> f64 {
        (self.range.0 + self.range.1) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.range.1 - self.range.0
    }
}

/// Deterministic multiple-based valuation.
pub struct ValuationEngine {
    config: ValuationConfig,
}

impl Default for ValuationEngine {
    fn default() -> Self {
        Self::new(ValuationConfig::default())
    }
}

impl ValuationEngine {
    pub fn new(config: ValuationConfig) -> Self {
        Self { config }
    }

    /// Most recent index with positive net income or operating profit.
    pub fn reference_index(dataset: &FinancialDataset) -> Option<usize> {
        (0..dataset.len()).rev().find(|&i| {
            dataset.value(CanonicalItem::NetIncome, i).unwrap_or(0) > 0
                || dataset.value(CanonicalItem::OperatingProfit, i).unwrap_or(0) > 0
        })
    }

    pub fn valuate(&self, dataset: &FinancialDataset) -> ValuationResult {
        let Some(idx) = Self::reference_index(dataset) else {
            info!("No year with positive earnings; valuation has insufficient data");
            return ValuationResult::insufficient_data();
        };

        let year = dataset.years[idx];
        info!("Using {} figures for valuation", year);

        let net_income = dataset.value(CanonicalItem::NetIncome, idx).unwrap_or(0) as f64;
        let operating_profit =
            dataset.value(CanonicalItem::OperatingProfit, idx).unwrap_or(0) as f64;
        let equity = dataset.value(CanonicalItem::Equity, idx).unwrap_or(0) as f64;

        let per_value = if net_income > 0.0 {
            net_income * self.config.per_multiple
        } else {
            0.0
        };

        let estimated_ebitda = operating_profit * EBITDA_PROXY_FACTOR;
        let ebitda_value = if estimated_ebitda > 0.0 {
            estimated_ebitda * self.config.ebitda_multiple
        } else {
            0.0
        };

        let net_asset_value = equity;

        let positive: Vec<f64> = [per_value, ebitda_value, net_asset_value]
            .into_iter()
            .filter(|value| *value > 0.0)
            .collect();
        let range = if positive.is_empty() {
            (0.0, 0.0)
        } else {
            (
                positive.iter().copied().fold(f64::INFINITY, f64::min),
                positive.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        ValuationResult {
            outcome: ValuationOutcome::Estimated,
            reference_year: Some(year),
            methods: vec![
                ValuationMethod {
                    label: PER_LABEL.to_string(),
                    estimated_value: Some(per_value),
                },
                ValuationMethod {
                    label: EBITDA_LABEL.to_string(),
                    estimated_value: Some(ebitda_value),
                },
                ValuationMethod {
                    label: NET_ASSET_LABEL.to_string(),
                    estimated_value: Some(net_asset_value),
                },
            ],
            range,
        }
    }
}

/// Valuation with explicit industry multiples.
pub fn calculate_valuation(
    dataset: &FinancialDataset,
    per_multiple: f64,
    ebitda_multiple: f64,
) -> ValuationResult {
    ValuationEngine::new(ValuationConfig {
        per_multiple,
        ebitda_multiple,
    })
    .valuate(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(net_income: Vec<i64>, operating_profit: Vec<i64>, equity: Vec<i64>) -> FinancialDataset {
        let n = net_income.len();
        let json = serde_json::json!({
            "years": (0..n as i32).map(|i| 2020 + i).collect::<Vec<_>>(),
            "net_income": net_income,
            "operating_profit": operating_profit,
            "equity": equity,
        });
        FinancialDataset::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_reference_year_skips_loss_years() {
        let data = dataset(vec![100, 80, -20], vec![50, 40, -5], vec![500, 520, 510]);
        let result = ValuationEngine::default().valuate(&data);
        assert_eq!(result.reference_year, Some(2021));
        assert_eq!(result.methods[0].estimated_value, Some(1200.0));
    }

    #[test]
    fn test_negative_equity_is_reported_but_excluded_from_range() {
        let data = dataset(vec![0], vec![10], vec![-300]);
        let result = ValuationEngine::default().valuate(&data);

        assert_eq!(result.outcome, ValuationOutcome::Estimated);
        assert_eq!(result.methods[0].estimated_value, Some(0.0));
        assert_eq!(result.methods[2].estimated_value, Some(-300.0));
        assert!((result.range.0 - 96.0).abs() < 1e-9);
        assert!((result.range.1 - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_multiples() {
        let data = dataset(vec![10], vec![10], vec![0]);
        let result = calculate_valuation(&data, 20.0, 10.0);
        assert_eq!(result.methods[0].estimated_value, Some(200.0));
        assert!((result.methods[1].estimated_value.unwrap() - 120.0).abs() < 1e-9);
        assert!((result.range.0 - 120.0).abs() < 1e-9);
        assert_eq!(result.range.1, 200.0);
    }

    #[test]
    fn test_display_value() {
        let method = ValuationMethod {
            label: PER_LABEL.to_string(),
            estimated_value: Some(1500.0),
        };
        assert_eq!(method.display_value(), "1,500");
        assert_eq!(
            ValuationResult::insufficient_data().methods[0].display_value(),
            "N/A"
        );
    }
}
