use financial_valuation::*;
use serde_json::json;

fn record(id: &str, division: &str, amount: &str) -> RawStatementRecord {
    RawStatementRecord::new(id, division, amount)
}

fn dataset_from(value: serde_json::Value) -> FinancialDataset {
    FinancialDataset::from_json(&value.to_string()).unwrap()
}

/// Three years of a mid-sized manufacturer, in the disclosure source's wire format.
fn disclosure_payloads() -> Vec<Option<serde_json::Value>> {
    vec![
        Some(json!({
            "status": "000",
            "list": [
                {"account_id": "ifrs-full_Assets", "account_nm": "Total assets", "sj_div": "BS", "thstrm_amount": "1,000,000,000"},
                {"account_id": "ifrs-full_Liabilities", "account_nm": "Total liabilities", "sj_div": "BS", "thstrm_amount": "600,000,000"},
                {"account_id": "ifrs-full_Equity", "account_nm": "Total equity", "sj_div": "BS", "thstrm_amount": "400,000,000"},
                {"account_id": "ifrs-full_Revenue", "account_nm": "Revenue", "sj_div": "IS", "thstrm_amount": "1,000,000,000"},
                {"account_id": "dart_OperatingIncomeLoss", "account_nm": "Operating profit", "sj_div": "IS", "thstrm_amount": "80,000,000"},
                {"account_id": "ifrs-full_ProfitLoss", "account_nm": "Net income", "sj_div": "IS", "thstrm_amount": "50,000,000"}
            ]
        })),
        Some(json!({
            "list": [
                {"account_id": "ifrs-full_Assets", "sj_div": "BS", "thstrm_amount": "1,100,000,000"},
                {"account_id": "ifrs-full_Liabilities", "sj_div": "BS", "thstrm_amount": "650,000,000"},
                {"account_id": "ifrs-full_Equity", "sj_div": "BS", "thstrm_amount": "450,000,000"},
                {"account_id": "ifrs-full_Revenue", "sj_div": "CIS", "thstrm_amount": "1,100,000,000"},
                {"account_id": "dart_OperatingIncomeLoss", "sj_div": "CIS", "thstrm_amount": "90,000,000"},
                {"account_id": "ifrs-full_ProfitLoss", "sj_div": "CIS", "thstrm_amount": "60,000,000"}
            ]
        })),
        Some(json!({
            "list": [
                {"account_id": "ifrs-full_Assets", "sj_div": "BS", "thstrm_amount": 1200000000},
                {"account_id": "ifrs-full_Equity", "sj_div": "BS", "thstrm_amount": "500,000,000"},
                {"account_id": "ifrs-full_Revenue", "sj_div": "IS", "thstrm_amount": "1,210,000,000"},
                {"account_id": "dart_OperatingIncomeLoss", "sj_div": "IS", "thstrm_amount": "50,000,000"},
                {"account_id": "ifrs-full_ProfitLoss", "sj_div": "IS", "thstrm_amount": "100,000,000"}
            ]
        })),
    ]
}

#[test]
fn test_full_pipeline_from_disclosure_json() {
    let years = [2021, 2022, 2023];
    let dataset = DataAggregator::default().aggregate_json(&disclosure_payloads(), &years);

    assert_eq!(dataset.years, years.to_vec());
    assert_eq!(dataset.revenue, vec![1000, 1100, 1210]);
    assert_eq!(dataset.net_income, vec![50, 60, 100]);
    assert_eq!(dataset.liabilities, vec![600, 650, 0]);
    assert!(dataset.validate().is_ok());

    let ratios = calculate_ratios(&dataset);
    assert_eq!(ratios.revenue_growth, vec!["-", "10.00%", "10.00%"]);
    assert_eq!(ratios.operating_margin[0], "8.00%");
    assert_eq!(ratios.roe[0], "12.50%");
    assert_eq!(ratios.debt_ratio[0], "60.00%");
    assert_eq!(ratios.debt_to_equity[0], "150.00%");

    let valuation = ValuationEngine::default().valuate(&dataset);
    assert_eq!(valuation.reference_year, Some(2023));
    assert_eq!(valuation.methods[0].estimated_value, Some(1500.0));
    assert!((valuation.methods[1].estimated_value.unwrap() - 480.0).abs() < 1e-6);
    assert_eq!(valuation.methods[2].estimated_value, Some(500.0));
    assert!((valuation.range.0 - 480.0).abs() < 1e-6);
    assert_eq!(valuation.range.1, 1500.0);
}

#[test]
fn test_valuation_worked_example() {
    let data = dataset_from(json!({
        "years": [2023],
        "net_income": [100],
        "operating_profit": [50],
        "equity": [500],
    }));
    let result = calculate_valuation(&data, 15.0, 8.0);

    let labels: Vec<&str> = result.methods.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec![PER_LABEL, EBITDA_LABEL, NET_ASSET_LABEL]);
    assert_eq!(result.methods[0].display_value(), "1,500");
    assert_eq!(result.methods[1].display_value(), "480");
    assert_eq!(result.methods[2].display_value(), "500");
    assert!((result.midpoint() - 990.0).abs() < 1e-6);
    assert!((result.spread() - 1020.0).abs() < 1e-6);
}

#[test]
fn test_insufficient_data_when_no_year_is_profitable() {
    let data = dataset_from(json!({
        "years": [2021, 2022, 2023],
        "net_income": [-10, 0, -5],
        "operating_profit": [0, -3, 0],
        "equity": [900, 800, 700],
    }));
    let result = ValuationEngine::default().valuate(&data);

    assert_eq!(result.outcome, ValuationOutcome::InsufficientData);
    assert_eq!(result.reference_year, None);
    assert_eq!(result.methods.len(), 1);
    assert_eq!(result.methods[0].label, INSUFFICIENT_DATA_LABEL);
    assert_eq!(result.methods[0].display_value(), "N/A");
    assert_eq!(result.range, (0.0, 0.0));
    assert!(!result.has_range());
}

#[test]
fn test_empty_dataset_is_insufficient() {
    let result = ValuationEngine::default().valuate(&FinancialDataset::default());
    assert_eq!(result.outcome, ValuationOutcome::InsufficientData);
    assert!(calculate_ratios(&FinancialDataset::default()).rows().is_empty());
}

#[test]
fn test_non_positive_denominators_yield_sentinel() {
    let data = dataset_from(json!({
        "years": [2022, 2023],
        "revenue": [-100, 0],
        "net_income": [10, 10],
        "operating_profit": [5, 5],
        "equity": [0, -50],
        "assets": [0, 0],
        "liabilities": [20, 20],
    }));
    let table = RatioEngine::ratios(&data);

    for column in [
        &table.revenue_growth,
        &table.operating_margin,
        &table.net_margin,
        &table.roe,
        &table.roa,
        &table.debt_ratio,
        &table.debt_to_equity,
    ] {
        assert_eq!(column, &vec![RATIO_SENTINEL.to_string(); 2]);
    }
}

#[test]
fn test_missing_years_become_zero_rows() {
    let payloads = vec![
        None,
        Some(StatementPayload { records: None }),
        Some(StatementPayload::new(vec![])),
        Some(StatementPayload::new(vec![record("ifrs-full_Revenue", "IS", "3,000,000")])),
    ];
    let years = [2020, 2021, 2022, 2023];
    let (dataset, issues) = DataAggregator::default().aggregate_with_diagnostics(&payloads, &years);

    assert_eq!(dataset.len(), 4);
    for item in CanonicalItem::ALL {
        assert_eq!(dataset.series(item).len(), 4, "{}", item.key());
    }
    assert_eq!(dataset.revenue, vec![0, 0, 0, 3]);
    assert_eq!(
        issues,
        vec![
            DataIssue::DataUnavailable { year: 2020 },
            DataIssue::DataUnavailable { year: 2021 },
            DataIssue::DataUnavailable { year: 2022 },
        ]
    );
}

#[test]
fn test_first_matching_alias_wins_and_zero_does_not_lock() {
    let records = vec![
        record("ifrs-full_Revenue", "IS", "0"),
        record("ifrs-full_OperatingRevenue", "IS", "7,000,000"),
        record("ifrs-full_Sales", "IS", "9,000,000"),
        record("ifrs-full_Equity", "IS", "1,000,000"),
        record("ifrs-full_Equity", "BS", "2,500,000"),
    ];
    let values = resolve(&records, AccountTaxonomyTable::standard());

    assert_eq!(values[&CanonicalItem::Revenue], 7);
    assert_eq!(values[&CanonicalItem::Equity], 2);
    assert_eq!(values.len(), CanonicalItem::ALL.len());
}

#[test]
fn test_malformed_amounts_are_absorbed() {
    let payloads = vec![Some(StatementPayload::new(vec![
        record("ifrs-full_Revenue", "IS", "n/a"),
        record("ifrs-full_Revenue", "IS", "4,000,000"),
        RawStatementRecord {
            current_amount: None,
            ..record("ifrs-full_Assets", "BS", "")
        },
    ]))];
    let (dataset, issues) = DataAggregator::default().aggregate_with_diagnostics(&payloads, &[2023]);

    assert_eq!(dataset.revenue, vec![4]);
    assert_eq!(dataset.assets, vec![0]);
    assert_eq!(issues.len(), 2);
    assert!(issues
        .iter()
        .all(|issue| matches!(issue, DataIssue::NumericParse { year: 2023, .. })));
}

#[test]
fn test_floor_division_to_millions() {
    assert_eq!(parse_millions("1,999,999"), Some(1));
    assert_eq!(parse_millions("-1"), Some(-1));
    assert_eq!(parse_millions("-1,000,000"), Some(-1));
    assert_eq!(parse_millions(""), None);
}

#[test]
fn test_aggregation_is_deterministic() {
    let years = [2021, 2022, 2023];
    let first = DataAggregator::default().aggregate_json(&disclosure_payloads(), &years);
    let second = DataAggregator::default().aggregate_json(&disclosure_payloads(), &years);
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_dataset_json_round_trip_keeps_years() {
    let years = [2021, 2022, 2023];
    let dataset = DataAggregator::default().aggregate_json(&disclosure_payloads(), &years);
    let restored = FinancialDataset::from_json(&dataset.to_json().unwrap()).unwrap();
    assert_eq!(restored, dataset);

    let broken = json!({"years": [2022, 2023], "revenue": [1]}).to_string();
    assert!(matches!(
        FinancialDataset::from_json(&broken),
        Err(ValuationError::InvalidDataset { expected: 2, actual: 1, .. })
    ));
}

#[test]
fn test_year_range_drives_aggregation() {
    let range = YearRange::trailing(2023, 3);
    assert_eq!(range.years(), vec![2021, 2022, 2023]);
    assert!(YearRange::new(2024, 2023).is_err());

    let dataset = aggregate(&[], &range.years());
    assert_eq!(dataset.len(), 3);
    assert_eq!(YearRange::of(&dataset), Some(range));
}

#[test]
fn test_custom_taxonomy_table() {
    let table = AccountTaxonomyTable::new(vec![TaxonomyEntry::new(
        CanonicalItem::Revenue,
        &["custom_TurnoverTotal"],
    )]);
    let payloads = vec![Some(StatementPayload::new(vec![
        record("custom_TurnoverTotal", "IS", "12,000,000"),
        record("ifrs-full_Revenue", "IS", "99,000,000"),
    ]))];
    let dataset = DataAggregator::new(&table).aggregate(&payloads, &[2023]);
    assert_eq!(dataset.revenue, vec![12]);
}
