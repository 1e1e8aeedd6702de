use crate::error::DataIssue;
use crate::schema::{FinancialDataset, StatementPayload};
use crate::taxonomy::{AccountTaxonomyTable, TaxonomyResolver};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Builds a [`FinancialDataset`] from one statement payload per year.
///
/// Never fails: a year whose payload is absent, undecodable or empty becomes
/// a row of zeros, and the dataset always has one entry per requested year.
pub struct DataAggregator<'a> {
    resolver: TaxonomyResolver<'a>,
}

impl Default for DataAggregator<'static> {
    fn default() -> Self {
        Self::new(AccountTaxonomyTable::standard())
    }
}

impl<'a> DataAggregator<'a> {
    pub fn new(table: &'a AccountTaxonomyTable) -> Self {
        Self {
            resolver: TaxonomyResolver::new(table),
        }
    }

    /// `yearly_payloads[i]` belongs to `years[i]`. Missing trailing payloads
    /// count as absent years and surplus payloads are ignored.
    pub fn aggregate(
        &self,
        yearly_payloads: &[Option<StatementPayload>],
        years: &[i32],
    ) -> FinancialDataset {
        self.aggregate_with_diagnostics(yearly_payloads, years).0
    }

    /// Same as [`aggregate`](Self::aggregate), also returning every data
    /// problem that was absorbed along the way.
    pub fn aggregate_with_diagnostics(
        &self,
        yearly_payloads: &[Option<StatementPayload>],
        years: &[i32],
    ) -> (FinancialDataset, Vec<DataIssue>) {
        if yearly_payloads.len() != years.len() {
            warn!(
                "Received {} payloads for {} years; output follows the year list",
                yearly_payloads.len(),
                years.len()
            );
        }

        let mut dataset = FinancialDataset::default();
        let mut issues = Vec::new();

        for (idx, year) in years.iter().copied().enumerate() {
            let records = yearly_payloads
                .get(idx)
                .and_then(Option::as_ref)
                .and_then(|payload| payload.records.as_deref())
                .filter(|records| !records.is_empty());

            let values = match records {
                Some(records) => {
                    debug!("{}: resolving {} statement records", year, records.len());
                    self.resolver.resolve_year(year, records, &mut issues)
                }
                None => {
                    info!("{}: no statement data, filling with zeros", year);
                    issues.push(DataIssue::DataUnavailable { year });
                    BTreeMap::new()
                }
            };

            dataset.push_year(year, &values);
        }

        (dataset, issues)
    }

    /// Aggregates payloads that have not been decoded yet. A payload that
    /// does not decode is treated like a missing one.
    pub fn aggregate_json(
        &self,
        yearly_payloads: &[Option<serde_json::Value>],
        years: &[i32],
    ) -> FinancialDataset {
        let decoded: Vec<Option<StatementPayload>> = yearly_payloads
            .iter()
            .enumerate()
            .map(|(idx, payload)| {
                payload.as_ref().and_then(|value| {
                    serde_json::from_value(value.clone())
                        .map_err(|e| {
                            warn!(
                                "Payload #{} ({:?}) could not be decoded: {}",
                                idx,
                                years.get(idx),
                                e
                            )
                        })
                        .ok()
                })
            })
            .collect();

        self.aggregate(&decoded, years)
    }
}

/// Aggregates with the standard taxonomy table.
pub fn aggregate(yearly_payloads: &[Option<StatementPayload>], years: &[i32]) -> FinancialDataset {
    DataAggregator::default().aggregate(yearly_payloads, years)
}
