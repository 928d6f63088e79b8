//! Aligns heterogeneous monthly series onto one calendar.
use crate::core::series::{MonthKey, SeriesResult, month_index};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// One calendar month with a value (or null) per tracked series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: MonthKey,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl MergedRow {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }
}

/// Canonical months in the order of `dates`, each month listed once.
pub fn canonical_months(dates: &[NaiveDate]) -> Vec<MonthKey> {
    let mut seen = HashSet::with_capacity(dates.len());
    dates
        .iter()
        .map(|d| MonthKey::of(*d))
        .filter(|m| seen.insert(*m))
        .collect()
}

/// Joins every series onto the canonical dates by calendar month.
///
/// Series are matched by year and month rather than exact day, since providers
/// stamp monthly values at different days of the month. Unavailable series and
/// months without a match become null. Rows without a value for `reference_key`
/// are dropped.
pub fn merge_calendar(
    series: &BTreeMap<String, SeriesResult>,
    dates: &[NaiveDate],
    reference_key: &str,
) -> Vec<MergedRow> {
    let indexes: BTreeMap<&str, Option<HashMap<MonthKey, f64>>> = series
        .iter()
        .map(|(key, result)| (key.as_str(), result.points().map(month_index)))
        .collect();

    let rows: Vec<MergedRow> = canonical_months(dates)
        .into_iter()
        .map(|month| MergedRow {
            date: month,
            values: indexes
                .iter()
                .map(|(key, index)| {
                    let value = index.as_ref().and_then(|idx| idx.get(&month).copied());
                    (key.to_string(), value)
                })
                .collect(),
        })
        .filter(|row| row.get(reference_key).is_some())
        .collect();

    debug!(
        "Merged {} series onto {} calendar rows",
        series.len(),
        rows.len()
    );
    rows
}
