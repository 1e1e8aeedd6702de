use crate::schema::{CanonicalItem, FinancialDataset};
use crate::utils::{percent_or_sentinel, percentage};
use serde::{Deserialize, Serialize};

/// Percentage ratios of one year; `None` where the denominator was not positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRatios {
    pub year: i32,
    pub revenue_growth: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

/// Display table: `"12.34%"` strings or `"-"`, aligned with the dataset's years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RatioTable {
    pub years: Vec<i32>,
    pub revenue_growth: Vec<String>,
    pub operating_margin: Vec<String>,
    pub net_margin: Vec<String>,
    pub roe: Vec<String>,
    pub roa: Vec<String>,
    pub debt_ratio: Vec<String>,
    pub debt_to_equity: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioRow {
    pub year: i32,
    pub revenue_growth: String,
    pub operating_margin: String,
    pub net_margin: String,
    pub roe: String,
    pub roa: String,
    pub debt_ratio: String,
    pub debt_to_equity: String,
}

impl RatioTable {
    pub fn rows(&self) -> Vec<RatioRow> {
        (0..self.years.len())
            .map(|i| RatioRow {
                year: self.years[i],
                revenue_growth: self.revenue_growth[i].clone(),
                operating_margin: self.operating_margin[i].clone(),
                net_margin: self.net_margin[i].clone(),
                roe: self.roe[i].clone(),
                roa: self.roa[i].clone(),
                debt_ratio: self.debt_ratio[i].clone(),
                debt_to_equity: self.debt_to_equity[i].clone(),
            })
            .collect()
    }
}

pub struct RatioEngine;

impl RatioEngine {
    /// Series shorter than `years` read as 0 past their end.
    pub fn year_ratios(dataset: &FinancialDataset) -> Vec<YearRatios> {
        let at = |item: CanonicalItem, i: usize| dataset.value(item, i).unwrap_or(0);

        (0..dataset.len())
            .map(|i| {
                let revenue = at(CanonicalItem::Revenue, i);
                let net_income = at(CanonicalItem::NetIncome, i);
                let equity = at(CanonicalItem::Equity, i);
                let assets = at(CanonicalItem::Assets, i);
                let liabilities = at(CanonicalItem::Liabilities, i);

                let previous = i.checked_sub(1).map(|prev| at(CanonicalItem::Revenue, prev));
                let revenue_growth = match previous {
                    Some(previous) if previous > 0 => {
                        Some((revenue as f64 / previous as f64 - 1.0) * 100.0)
                    }
                    _ => None,
                };

                YearRatios {
                    year: dataset.years[i],
                    revenue_growth,
                    operating_margin: percentage(at(CanonicalItem::OperatingProfit, i), revenue),
                    net_margin: percentage(net_income, revenue),
                    roe: percentage(net_income, equity),
                    roa: percentage(net_income, assets),
                    debt_ratio: percentage(liabilities, assets),
                    debt_to_equity: percentage(liabilities, equity),
                }
            })
            .collect()
    }

    pub fn ratios(dataset: &FinancialDataset) -> RatioTable {
        let mut table = RatioTable::default();
        for year in Self::year_ratios(dataset) {
            table.years.push(year.year);
            table
                .revenue_growth
                .push(percent_or_sentinel(year.revenue_growth));
            table
                .operating_margin
                .push(percent_or_sentinel(year.operating_margin));
            table.net_margin.push(percent_or_sentinel(year.net_margin));
            table.roe.push(percent_or_sentinel(year.roe));
            table.roa.push(percent_or_sentinel(year.roa));
            table.debt_ratio.push(percent_or_sentinel(year.debt_ratio));
            table
                .debt_to_equity
                .push(percent_or_sentinel(year.debt_to_equity));
        }
        table
    }
}

pub fn calculate_ratios(dataset: &FinancialDataset) -> RatioTable {
    RatioEngine::ratios(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(json: serde_json::Value) -> FinancialDataset {
        FinancialDataset::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_margins_and_leverage() {
        let data = dataset(serde_json::json!({
            "years": [2023],
            "revenue": [2000],
            "operating_profit": [300],
            "net_income": [100],
            "equity": [400],
            "assets": [1000],
            "liabilities": [600],
        }));
        let ratios = RatioEngine::year_ratios(&data);
        assert_eq!(ratios[0].operating_margin, Some(15.0));
        assert_eq!(ratios[0].net_margin, Some(5.0));
        assert_eq!(ratios[0].roe, Some(25.0));
        assert_eq!(ratios[0].roa, Some(10.0));
        assert_eq!(ratios[0].debt_ratio, Some(60.0));
        assert_eq!(ratios[0].debt_to_equity, Some(150.0));
        assert_eq!(ratios[0].revenue_growth, None);
    }

    #[test]
    fn test_growth_needs_positive_previous_revenue() {
        let data = dataset(serde_json::json!({
            "years": [2021, 2022, 2023],
            "revenue": [0, 500, 250],
        }));
        let table = RatioEngine::ratios(&data);
        assert_eq!(table.revenue_growth, vec!["-", "-", "-50.00%"]);
        assert_eq!(table.operating_margin, vec!["-", "0.00%", "0.00%"]);
    }

    #[test]
    fn test_rows_follow_years() {
        let data = dataset(serde_json::json!({
            "years": [2022, 2023],
            "revenue": [100, 110],
            "net_income": [10, -11],
        }));
        let rows = calculate_ratios(&data).rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].year, 2023);
        assert_eq!(rows[1].revenue_growth, "10.00%");
        assert_eq!(rows[1].net_margin, "-10.00%");
        assert_eq!(rows[1].roe, "-");
    }
}
