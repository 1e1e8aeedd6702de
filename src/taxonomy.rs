//! Alias table and resolver that map raw, inconsistently tagged statement
//! records onto the canonical line items.

use crate::error::DataIssue;
use crate::schema::{CanonicalItem, RawStatementRecord};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Amounts are disclosed in currency units; the dataset is kept in millions.
pub const UNITS_PER_MILLION: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub item: CanonicalItem,
    pub aliases: Vec<String>,
}

impl TaxonomyEntry {
    pub fn new(item: CanonicalItem, aliases: &[&str]) -> Self {
        Self {
            item,
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
        }
    }

    pub fn matches(&self, account_id: &str) -> bool {
        self.aliases.iter().any(|alias| alias == account_id)
    }
}

/// Canonical item to acceptable `account_id` aliases. The expected statement
/// of each entry comes from [`CanonicalItem::statement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTaxonomyTable {
    entries: Vec<TaxonomyEntry>,
}

impl AccountTaxonomyTable {
    pub fn new(entries: Vec<TaxonomyEntry>) -> Self {
        Self { entries }
    }

    /// The process-wide table covering IFRS full, legacy IFRS and untagged
    /// names, plus the local-GAAP operating income tag.
    pub fn standard() -> &'static AccountTaxonomyTable {
        static STANDARD: OnceLock<AccountTaxonomyTable> = OnceLock::new();
        STANDARD.get_or_init(build_standard_table)
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn aliases(&self, item: CanonicalItem) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.item == item)
            .flat_map(|entry| entry.aliases.iter().map(String::as_str))
            .collect()
    }
}

fn build_standard_table() -> AccountTaxonomyTable {
    use CanonicalItem::*;

    AccountTaxonomyTable::new(vec![
        TaxonomyEntry::new(
            Assets,
            &[
                "ifrs-full_Assets",
                "ifrs_Assets",
                "Assets",
                "ifrs-full_TotalAssets",
                "ifrs_TotalAssets",
                "TotalAssets",
            ],
        ),
        TaxonomyEntry::new(
            CurrentAssets,
            &["ifrs-full_CurrentAssets", "ifrs_CurrentAssets", "CurrentAssets"],
        ),
        TaxonomyEntry::new(
            CashAndEquivalents,
            &[
                "ifrs-full_CashAndCashEquivalents",
                "ifrs_CashAndCashEquivalents",
                "CashAndCashEquivalents",
            ],
        ),
        TaxonomyEntry::new(
            TradeReceivables,
            &[
                "ifrs-full_TradeAndOtherCurrentReceivables",
                "ifrs_TradeAndOtherCurrentReceivables",
                "TradeAndOtherCurrentReceivables",
                "ifrs-full_TradeReceivables",
                "ifrs_TradeReceivables",
            ],
        ),
        TaxonomyEntry::new(
            Inventories,
            &["ifrs-full_Inventories", "ifrs_Inventories", "Inventories"],
        ),
        TaxonomyEntry::new(
            NonCurrentAssets,
            &[
                "ifrs-full_NoncurrentAssets",
                "ifrs_NoncurrentAssets",
                "NoncurrentAssets",
            ],
        ),
        TaxonomyEntry::new(
            Liabilities,
            &[
                "ifrs-full_Liabilities",
                "ifrs_Liabilities",
                "Liabilities",
                "ifrs-full_TotalLiabilities",
                "ifrs_TotalLiabilities",
                "TotalLiabilities",
            ],
        ),
        TaxonomyEntry::new(
            CurrentLiabilities,
            &[
                "ifrs-full_CurrentLiabilities",
                "ifrs_CurrentLiabilities",
                "CurrentLiabilities",
            ],
        ),
        TaxonomyEntry::new(
            TradePayables,
            &[
                "ifrs-full_TradeAndOtherCurrentPayables",
                "ifrs_TradeAndOtherCurrentPayables",
                "TradeAndOtherCurrentPayables",
                "ifrs-full_TradePayables",
                "ifrs_TradePayables",
            ],
        ),
        TaxonomyEntry::new(
            ShortTermBorrowings,
            &[
                "ifrs-full_ShorttermBorrowings",
                "ifrs_ShorttermBorrowings",
                "ShorttermBorrowings",
            ],
        ),
        TaxonomyEntry::new(
            NonCurrentLiabilities,
            &[
                "ifrs-full_NoncurrentLiabilities",
                "ifrs_NoncurrentLiabilities",
                "NoncurrentLiabilities",
            ],
        ),
        TaxonomyEntry::new(
            Equity,
            &[
                "ifrs-full_Equity",
                "ifrs_Equity",
                "Equity",
                "EquityAttributableToOwnersOfParent",
                "ifrs-full_EquityAttributableToOwnersOfParent",
                "ifrs-full_TotalEquity",
                "ifrs_TotalEquity",
                "TotalEquity",
            ],
        ),
        TaxonomyEntry::new(
            Revenue,
            &[
                "ifrs-full_Revenue",
                "ifrs_Revenue",
                "Revenue",
                "ifrs-full_OperatingRevenue",
                "ifrs_OperatingRevenue",
                "OperatingRevenue",
                "ifrs-full_GrossOperatingProfit",
                "ifrs_GrossOperatingProfit",
                "GrossOperatingProfit",
                "ifrs-full_Sales",
                "ifrs_Sales",
                "Sales",
            ],
        ),
        TaxonomyEntry::new(
            OperatingProfit,
            &[
                "ifrs-full_OperatingIncome",
                "ifrs_OperatingIncome",
                "OperatingIncome",
                "ifrs-full_ProfitLossFromOperatingActivities",
                "ifrs_ProfitLossFromOperatingActivities",
                "ProfitLossFromOperatingActivities",
                "dart_OperatingIncomeLoss",
            ],
        ),
        TaxonomyEntry::new(
            NetIncome,
            &[
                "ifrs-full_ProfitLoss",
                "ifrs_ProfitLoss",
                "ProfitLoss",
                "ifrs-full_ProfitLossAttributableToOwnersOfParent",
                "ifrs_ProfitLossAttributableToOwnersOfParent",
                "ProfitLossAttributableToOwnersOfParent",
                "ifrs-full_NetIncome",
                "ifrs_NetIncome",
                "NetIncome",
            ],
        ),
    ])
}

/// Parses a thousands-separated amount and converts it to millions.
///
/// Division floors toward negative infinity, so `-1` unit becomes `-1`
/// million rather than `0`.
pub fn parse_millions(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let units: i64 = cleaned.trim().parse().ok()?;
    Some(units.div_euclid(UNITS_PER_MILLION))
}

/// Extracts one value per canonical item from one year of records.
pub struct TaxonomyResolver<'a> {
    table: &'a AccountTaxonomyTable,
}

impl Default for TaxonomyResolver<'static> {
    fn default() -> Self {
        Self::new(AccountTaxonomyTable::standard())
    }
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(table: &'a AccountTaxonomyTable) -> Self {
        Self { table }
    }

    /// Returns a value for every canonical item, 0 where nothing matched.
    ///
    /// Records are visited in source order. A record only counts for an item
    /// when it sits on the statement that item belongs to. The first non-zero
    /// value an item receives is kept; later matches for it are ignored.
    pub fn resolve(&self, records: &[RawStatementRecord]) -> BTreeMap<CanonicalItem, i64> {
        let mut issues = Vec::new();
        self.resolve_year(0, records, &mut issues)
    }

    pub(crate) fn resolve_year(
        &self,
        year: i32,
        records: &[RawStatementRecord],
        issues: &mut Vec<DataIssue>,
    ) -> BTreeMap<CanonicalItem, i64> {
        let mut values: BTreeMap<CanonicalItem, i64> =
            CanonicalItem::ALL.iter().map(|item| (*item, 0)).collect();

        for record in records {
            if record.account_id.is_empty() {
                continue;
            }

            for entry in self.table.entries() {
                if !entry.matches(&record.account_id)
                    || !entry.item.statement().accepts(&record.statement_division)
                {
                    continue;
                }

                let slot = values.entry(entry.item).or_insert(0);
                if *slot != 0 {
                    debug!(
                        "{}: ignoring later match '{}' for {}",
                        year,
                        record.account_id,
                        entry.item.key()
                    );
                    continue;
                }

                match record.current_amount.as_deref().and_then(parse_millions) {
                    Some(millions) => *slot = millions,
                    None => {
                        warn!(
                            "{}: could not parse amount {:?} for '{}'",
                            year, record.current_amount, record.account_id
                        );
                        issues.push(DataIssue::NumericParse {
                            year,
                            account_id: record.account_id.clone(),
                            raw: record.current_amount.clone(),
                        });
                    }
                }
            }
        }

        values
    }
}

/// Resolves one year of records against `table`.
pub fn resolve(
    records: &[RawStatementRecord],
    table: &AccountTaxonomyTable,
) -> BTreeMap<CanonicalItem, i64> {
    TaxonomyResolver::new(table).resolve(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millions() {
        assert_eq!(parse_millions("1,234,000,000"), Some(1234));
        assert_eq!(parse_millions(" 999,999 "), Some(0));
        assert_eq!(parse_millions("-1"), Some(-1));
        assert_eq!(parse_millions("-2,500,000"), Some(-3));
        assert_eq!(parse_millions(""), None);
        assert_eq!(parse_millions("n/a"), None);
        assert_eq!(parse_millions("12.5"), None);
    }

    #[test]
    fn test_every_item_has_aliases() {
        let table = AccountTaxonomyTable::standard();
        for item in CanonicalItem::ALL {
            assert!(!table.aliases(item).is_empty(), "{:?} has no aliases", item);
        }
    }

    #[test]
    fn test_first_match_wins() {
        let records = vec![
            RawStatementRecord::new("ifrs-full_Revenue", "CIS", "1,000,000,000"),
            RawStatementRecord::new("ifrs-full_Sales", "CIS", "9,000,000,000"),
        ];
        let values = resolve(&records, AccountTaxonomyTable::standard());
        assert_eq!(values[&CanonicalItem::Revenue], 1000);
    }

    #[test]
    fn test_zero_value_does_not_lock_item() {
        let records = vec![
            RawStatementRecord::new("ifrs-full_Revenue", "IS", "0"),
            RawStatementRecord::new("Revenue", "IS", "7,000,000"),
        ];
        let values = resolve(&records, AccountTaxonomyTable::standard());
        assert_eq!(values[&CanonicalItem::Revenue], 7);
    }

    #[test]
    fn test_division_must_match_statement() {
        let records = vec![
            RawStatementRecord::new("ifrs-full_Assets", "IS", "5,000,000"),
            RawStatementRecord::new("ifrs-full_ProfitLoss", "BS", "8,000,000"),
            RawStatementRecord::new("ifrs-full_ProfitLoss", "CF", "8,000,000"),
        ];
        let values = resolve(&records, AccountTaxonomyTable::standard());
        assert_eq!(values[&CanonicalItem::Assets], 0);
        assert_eq!(values[&CanonicalItem::NetIncome], 0);
    }

    #[test]
    fn test_unparseable_amount_is_recorded() {
        let resolver = TaxonomyResolver::default();
        let mut issues = Vec::new();
        let records = vec![
            RawStatementRecord::new("ifrs-full_Equity", "BS", "abc"),
            RawStatementRecord::new("ifrs-full_Liabilities", "BS", "3,000,000"),
        ];
        let values = resolver.resolve_year(2023, &records, &mut issues);

        assert_eq!(values[&CanonicalItem::Equity], 0);
        assert_eq!(values[&CanonicalItem::Liabilities], 3);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            DataIssue::NumericParse { year: 2023, account_id, .. } if account_id == "ifrs-full_Equity"
        ));
    }

    #[test]
    fn test_custom_table() {
        let table = AccountTaxonomyTable::new(vec![TaxonomyEntry::new(
            CanonicalItem::Revenue,
            &["us-gaap_Revenues"],
        )]);
        let records = vec![RawStatementRecord::new("us-gaap_Revenues", "IS", "42,000,000")];
        let values = resolve(&records, &table);
        assert_eq!(values[&CanonicalItem::Revenue], 42);
        assert_eq!(values.len(), CanonicalItem::ALL.len());
    }
}
