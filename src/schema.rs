use crate::error::{Result, ValuationError};
use chrono::{Datelike, Local};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which statement a raw record was disclosed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Option<Value>", into = "String")]
pub enum StatementDivision {
    /// `BS`
    BalanceSheet,
    /// `IS`
    IncomeStatement,
    /// `CIS`
    ComprehensiveIncomeStatement,
    /// Any other code (cash flow `CF`, changes in equity `SCE`, blanks).
    #[default]
    Unknown,
    Other(String),
}

impl StatementDivision {
    pub fn code(&self) -> &str {
        match self {
            StatementDivision::BalanceSheet => "BS",
            StatementDivision::IncomeStatement => "IS",
            StatementDivision::ComprehensiveIncomeStatement => "CIS",
            StatementDivision::Unknown => "",
            StatementDivision::Other(code) => code,
        }
    }

    pub fn is_income_statement(&self) -> bool {
        matches!(
            self,
            StatementDivision::IncomeStatement | StatementDivision::ComprehensiveIncomeStatement
        )
    }
}

impl From<Option<String>> for StatementDivision {
    fn from(code: Option<String>) -> Self {
        match code.as_deref().map(str::trim) {
            Some("BS") => StatementDivision::BalanceSheet,
            Some("IS") => StatementDivision::IncomeStatement,
            Some("CIS") => StatementDivision::ComprehensiveIncomeStatement,
            None | Some("") => StatementDivision::Unknown,
            Some(other) => StatementDivision::Other(other.to_string()),
        }
    }
}

impl From<Option<Value>> for StatementDivision {
    /// Codes that are not text are treated as blank.
    fn from(code: Option<Value>) -> Self {
        match code {
            Some(Value::String(code)) => Some(code).into(),
            _ => StatementDivision::Unknown,
        }
    }
}

impl From<&str> for StatementDivision {
    fn from(code: &str) -> Self {
        Some(code.to_string()).into()
    }
}

impl From<StatementDivision> for String {
    fn from(division: StatementDivision) -> Self {
        division.code().to_string()
    }
}

/// One line item of one year's disclosed statement.
///
/// Accepts both the canonical field names and the disclosure source's own
/// (`account_nm`, `sj_div`, `thstrm_amount`). Missing, null or non-text
/// fields decode to empty values so a single bad record never voids the
/// whole year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawStatementRecord {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub account_id: String,

    #[serde(default, alias = "account_nm", deserialize_with = "text_or_empty")]
    pub account_name: String,

    #[serde(default, alias = "sj_div")]
    pub statement_division: StatementDivision,

    /// Decimal amount in currency units, thousands-separated (e.g. `"1,234,000,000"`).
    #[serde(default, alias = "thstrm_amount", deserialize_with = "amount_as_text")]
    pub current_amount: Option<String>,
}

impl RawStatementRecord {
    pub fn new(
        account_id: impl Into<String>,
        division: impl Into<StatementDivision>,
        current_amount: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            account_name: String::new(),
            statement_division: division.into(),
            current_amount: Some(current_amount.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }
}

fn text_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => text,
        _ => String::new(),
    })
}

fn amount_as_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// One year's response from the disclosure source. The record container is
/// the `list` field; it is absent when the source had nothing for that year.
/// Entries that are not record objects are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatementPayload {
    #[serde(
        default,
        rename = "list",
        alias = "records",
        deserialize_with = "records_skipping_malformed"
    )]
    pub records: Option<Vec<RawStatementRecord>>,
}

fn records_skipping_malformed<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<RawStatementRecord>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(entries) = Option::<Vec<Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let records = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping statement record #{}: {}", idx, e);
                None
            }
        })
        .collect();
    Ok(Some(records))
}

impl StatementPayload {
    pub fn new(records: Vec<RawStatementRecord>) -> Self {
        Self {
            records: Some(records),
        }
    }
}

/// The fixed set of line items the normalizer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalItem {
    Assets,
    CurrentAssets,
    CashAndEquivalents,
    TradeReceivables,
    Inventories,
    NonCurrentAssets,
    Liabilities,
    CurrentLiabilities,
    TradePayables,
    ShortTermBorrowings,
    NonCurrentLiabilities,
    Equity,
    Revenue,
    OperatingProfit,
    NetIncome,
}

/// Statement a canonical item is expected to be disclosed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    BalanceSheet,
    IncomeStatement,
}

impl StatementKind {
    pub fn accepts(self, division: &StatementDivision) -> bool {
        match self {
            StatementKind::BalanceSheet => *division == StatementDivision::BalanceSheet,
            StatementKind::IncomeStatement => division.is_income_statement(),
        }
    }
}

impl CanonicalItem {
    pub const ALL: [CanonicalItem; 15] = [
        CanonicalItem::Assets,
        CanonicalItem::CurrentAssets,
        CanonicalItem::CashAndEquivalents,
        CanonicalItem::TradeReceivables,
        CanonicalItem::Inventories,
        CanonicalItem::NonCurrentAssets,
        CanonicalItem::Liabilities,
        CanonicalItem::CurrentLiabilities,
        CanonicalItem::TradePayables,
        CanonicalItem::ShortTermBorrowings,
        CanonicalItem::NonCurrentLiabilities,
        CanonicalItem::Equity,
        CanonicalItem::Revenue,
        CanonicalItem::OperatingProfit,
        CanonicalItem::NetIncome,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CanonicalItem::Assets => "assets",
            CanonicalItem::CurrentAssets => "current_assets",
            CanonicalItem::CashAndEquivalents => "cash_and_equivalents",
            CanonicalItem::TradeReceivables => "trade_receivables",
            CanonicalItem::Inventories => "inventories",
            CanonicalItem::NonCurrentAssets => "non_current_assets",
            CanonicalItem::Liabilities => "liabilities",
            CanonicalItem::CurrentLiabilities => "current_liabilities",
            CanonicalItem::TradePayables => "trade_payables",
            CanonicalItem::ShortTermBorrowings => "short_term_borrowings",
            CanonicalItem::NonCurrentLiabilities => "non_current_liabilities",
            CanonicalItem::Equity => "equity",
            CanonicalItem::Revenue => "revenue",
            CanonicalItem::OperatingProfit => "operating_profit",
            CanonicalItem::NetIncome => "net_income",
        }
    }

    pub fn statement(self) -> StatementKind {
        match self {
            CanonicalItem::Revenue | CanonicalItem::OperatingProfit | CanonicalItem::NetIncome => {
                StatementKind::IncomeStatement
            }
            _ => StatementKind::BalanceSheet,
        }
    }
}

/// Canonical per-year dataset, values in millions.
///
/// Every series has exactly one value per entry of `years`, in the same
/// order. A `0` means "not found or not applicable" as much as a true zero
/// balance; the source gives no way to tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FinancialDataset {
    pub years: Vec<i32>,

    pub assets: Vec<i64>,
    pub current_assets: Vec<i64>,
    pub cash_and_equivalents: Vec<i64>,
    pub trade_receivables: Vec<i64>,
    pub inventories: Vec<i64>,
    pub non_current_assets: Vec<i64>,

    pub liabilities: Vec<i64>,
    pub current_liabilities: Vec<i64>,
    pub trade_payables: Vec<i64>,
    pub short_term_borrowings: Vec<i64>,
    pub non_current_liabilities: Vec<i64>,

    pub equity: Vec<i64>,

    pub revenue: Vec<i64>,
    pub operating_profit: Vec<i64>,
    pub net_income: Vec<i64>,
}

/// Headline figures of one year, as handed to prompts and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub assets: i64,
    pub liabilities: i64,
    pub equity: i64,
    pub revenue: i64,
    pub operating_profit: i64,
    pub net_income: i64,
}

impl FinancialDataset {
    pub fn series(&self, item: CanonicalItem) -> &[i64] {
        match item {
            CanonicalItem::Assets => &self.assets,
            CanonicalItem::CurrentAssets => &self.current_assets,
            CanonicalItem::CashAndEquivalents => &self.cash_and_equivalents,
            CanonicalItem::TradeReceivables => &self.trade_receivables,
            CanonicalItem::Inventories => &self.inventories,
            CanonicalItem::NonCurrentAssets => &self.non_current_assets,
            CanonicalItem::Liabilities => &self.liabilities,
            CanonicalItem::CurrentLiabilities => &self.current_liabilities,
            CanonicalItem::TradePayables => &self.trade_payables,
            CanonicalItem::ShortTermBorrowings => &self.short_term_borrowings,
            CanonicalItem::NonCurrentLiabilities => &self.non_current_liabilities,
            CanonicalItem::Equity => &self.equity,
            CanonicalItem::Revenue => &self.revenue,
            CanonicalItem::OperatingProfit => &self.operating_profit,
            CanonicalItem::NetIncome => &self.net_income,
        }
    }

    fn series_mut(&mut self, item: CanonicalItem) -> &mut Vec<i64> {
        match item {
            CanonicalItem::Assets => &mut self.assets,
            CanonicalItem::CurrentAssets => &mut self.current_assets,
            CanonicalItem::CashAndEquivalents => &mut self.cash_and_equivalents,
            CanonicalItem::TradeReceivables => &mut self.trade_receivables,
            CanonicalItem::Inventories => &mut self.inventories,
            CanonicalItem::NonCurrentAssets => &mut self.non_current_assets,
            CanonicalItem::Liabilities => &mut self.liabilities,
            CanonicalItem::CurrentLiabilities => &mut self.current_liabilities,
            CanonicalItem::TradePayables => &mut self.trade_payables,
            CanonicalItem::ShortTermBorrowings => &mut self.short_term_borrowings,
            CanonicalItem::NonCurrentLiabilities => &mut self.non_current_liabilities,
            CanonicalItem::Equity => &mut self.equity,
            CanonicalItem::Revenue => &mut self.revenue,
            CanonicalItem::OperatingProfit => &mut self.operating_profit,
            CanonicalItem::NetIncome => &mut self.net_income,
        }
    }

    /// Appends one year; items missing from `values` get 0.
    pub(crate) fn push_year(
        &mut self,
        year: i32,
        values: &std::collections::BTreeMap<CanonicalItem, i64>,
    ) {
        self.years.push(year);
        for item in CanonicalItem::ALL {
            let value = values.get(&item).copied().unwrap_or(0);
            self.series_mut(item).push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn value(&self, item: CanonicalItem, index: usize) -> Option<i64> {
        self.series(item).get(index).copied()
    }

    /// Checks that every series is aligned with `years`.
    pub fn validate(&self) -> Result<()> {
        for item in CanonicalItem::ALL {
            let actual = self.series(item).len();
            if actual != self.years.len() {
                return Err(ValuationError::InvalidDataset {
                    series: item.key().to_string(),
                    expected: self.years.len(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Decodes a dataset from JSON and rejects misaligned series.
    ///
    /// Series left out of the JSON are filled with zeros, matching how
    /// aggregation treats items it could not find.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let mut object = match value {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(ValuationError::InvalidConfig(
                    "dataset JSON must be an object".to_string(),
                ))
            }
        };
        let years_len = object
            .get("years")
            .and_then(|years| years.as_array())
            .map(|years| years.len())
            .unwrap_or(0);
        for item in CanonicalItem::ALL {
            object
                .entry(item.key())
                .or_insert_with(|| serde_json::Value::from(vec![0i64; years_len]));
        }
        let dataset: FinancialDataset = serde_json::from_value(serde_json::Value::Object(object))?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn year_summaries(&self) -> Vec<YearSummary> {
        (0..self.len())
            .map(|i| YearSummary {
                year: self.years[i],
                assets: self.value(CanonicalItem::Assets, i).unwrap_or(0),
                liabilities: self.value(CanonicalItem::Liabilities, i).unwrap_or(0),
                equity: self.value(CanonicalItem::Equity, i).unwrap_or(0),
                revenue: self.value(CanonicalItem::Revenue, i).unwrap_or(0),
                operating_profit: self.value(CanonicalItem::OperatingProfit, i).unwrap_or(0),
                net_income: self.value(CanonicalItem::NetIncome, i).unwrap_or(0),
            })
            .collect()
    }
}

/// Inclusive span of fiscal years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(ValuationError::InvalidYearRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// `span` years ending at `end_year` (a span of 0 is treated as 1).
    pub fn trailing(end_year: i32, span: u32) -> Self {
        let span = span.max(1) as i32;
        Self {
            start: end_year - (span - 1),
            end: end_year,
        }
    }

    /// The three years ending last calendar year; the latest annual reports
    /// are usually not filed for the current year yet.
    pub fn default_trailing() -> Self {
        Self::trailing(Local::now().year() - 1, 3)
    }

    pub fn years(&self) -> Vec<i32> {
        (self.start..=self.end).collect()
    }

    /// Range covered by a dataset, if it has any years.
    pub fn of(dataset: &FinancialDataset) -> Option<Self> {
        let start = dataset.years.iter().copied().min()?;
        let end = dataset.years.iter().copied().max()?;
        Some(Self { start, end })
    }
}

/// Company metadata as returned by the disclosure source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompanyInfo {
    #[serde(default, alias = "corp_code")]
    pub company_id: Option<String>,

    #[serde(default, alias = "corp_name")]
    pub name: Option<String>,

    #[serde(default)]
    pub stock_code: Option<String>,

    #[serde(default, alias = "induty_code")]
    pub industry_code: Option<String>,

    #[serde(default, alias = "induty")]
    pub business_area: Option<String>,
}

impl CompanyInfo {
    pub fn new(company_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            company_id: Some(company_id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_industry(
        mut self,
        industry_code: impl Into<String>,
        business_area: impl Into<String>,
    ) -> Self {
        self.industry_code = Some(industry_code.into());
        self.business_area = Some(business_area.into());
        self
    }
}

/// Optional sector benchmarks fed to the generative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndustryInfo {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub avg_per: Option<f64>,
    #[serde(default)]
    pub avg_pbr: Option<f64>,
}
