//! Re-expresses merged rows under a chosen denominator, optionally rebased to 100.

use crate::core::calendar::MergedRow;
use crate::core::series::MonthKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

pub const GOLD_KEY: &str = "GOLD";
pub const CASE_SHILLER_KEY: &str = "CASE_SHILLER";
pub const PCE_KEY: &str = "PCE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Denominator {
    Gold,
    Houses,
    Pce,
    #[default]
    Usd,
}

impl Display for Denominator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Denominator::Gold => "GOLD",
                Denominator::Houses => "HOUSES",
                Denominator::Pce => "PCE",
                Denominator::Usd => "USD",
            }
        )
    }
}

impl FromStr for Denominator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GOLD" => Ok(Denominator::Gold),
            "HOUSES" => Ok(Denominator::Houses),
            "PCE" => Ok(Denominator::Pce),
            "USD" => Ok(Denominator::Usd),
            _ => Err(anyhow::anyhow!("Invalid denominator: {}", s)),
        }
    }
}

/// Trailing window of months to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    All,
    Months(usize),
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeRange::All => write!(f, "all"),
            TimeRange::Months(n) => write!(f, "{n}M"),
        }
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(TimeRange::All);
        }
        let digits = s.strip_suffix(['M', 'm']).unwrap_or(s);
        match digits.parse::<usize>() {
            Ok(0) => Err(anyhow::anyhow!("Time range must be at least one month")),
            Ok(n) => Ok(TimeRange::Months(n)),
            Err(_) => Err(anyhow::anyhow!("Invalid time range: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformParams {
    pub denominator: Denominator,
    pub range: TimeRange,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    pub date: MonthKey,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl ChartRow {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// The trailing `range` rows.
pub fn window(rows: &[MergedRow], range: TimeRange) -> &[MergedRow] {
    match range {
        TimeRange::All => rows,
        TimeRange::Months(n) => &rows[rows.len().saturating_sub(n)..],
    }
}

/// PCE level used to express every row in end-of-window dollars.
///
/// Taken from the last row of `rows`; if that month has not been published yet
/// the latest published value inside the window is used.
pub fn latest_pce(rows: &[MergedRow]) -> Option<f64> {
    rows.iter().rev().find_map(|row| row.get(PCE_KEY))
}

/// Windows, transforms and optionally indexes `rows` for charting.
pub fn chart_rows(rows: &[MergedRow], asset_keys: &[String], params: TransformParams) -> Vec<ChartRow> {
    transform(
        window(rows, params.range),
        asset_keys,
        params.denominator,
        params.indexed,
    )
}

/// Applies `denominator` to every asset of every row, then rebases each asset to
/// 100 at its first non-null value when `indexed` is set.
///
/// A missing or zero divisor on a row yields null for that row. Values are
/// rounded to four decimals unless the output is the untouched USD series.
pub fn transform(
    rows: &[MergedRow],
    asset_keys: &[String],
    denominator: Denominator,
    indexed: bool,
) -> Vec<ChartRow> {
    let latest_pce = latest_pce(rows);
    let rounded = indexed || denominator != Denominator::Usd;

    let (_, chart) = rows.iter().fold(
        (BTreeMap::<&str, f64>::new(), Vec::with_capacity(rows.len())),
        |(mut bases, mut chart), row| {
            let values = asset_keys
                .iter()
                .map(|key| {
                    let mut value = row
                        .get(key)
                        .and_then(|v| denominate(v, row, denominator, latest_pce));
                    if indexed {
                        value = value.and_then(|v| {
                            let base = *bases.entry(key.as_str()).or_insert(v);
                            Some(v / base * 100.0).filter(|x| x.is_finite())
                        });
                    }
                    let value = if rounded { value.map(round4) } else { value };
                    (key.clone(), value)
                })
                .collect();
            chart.push(ChartRow {
                date: row.date,
                values,
            });
            (bases, chart)
        },
    );
    chart
}

fn denominate(
    value: f64,
    row: &MergedRow,
    denominator: Denominator,
    latest_pce: Option<f64>,
) -> Option<f64> {
    let divisor = |key: &str| row.get(key).filter(|d| *d != 0.0);
    let result = match denominator {
        Denominator::Usd => Some(value),
        Denominator::Gold => divisor(GOLD_KEY).map(|gold| value / gold),
        Denominator::Houses => divisor(CASE_SHILLER_KEY).map(|houses| value / houses * 100.0),
        Denominator::Pce => {
            let latest = latest_pce?;
            divisor(PCE_KEY).map(|pce| value * (latest / pce))
        }
    };
    result.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(month: u32, values: &[(&str, Option<f64>)]) -> MergedRow {
        MergedRow {
            date: MonthKey::new(2024, month).unwrap(),
            values: values
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn values(chart: &[ChartRow], key: &str) -> Vec<Option<f64>> {
        chart.iter().map(|r| r.get(key)).collect()
    }

    fn reference_rows() -> Vec<MergedRow> {
        vec![
            row(1, &[("SP500", Some(100.0)), ("PCE", Some(120.0)), ("GOLD", Some(2000.0))]),
            row(2, &[("SP500", Some(110.0)), ("PCE", Some(121.0)), ("GOLD", None)]),
            row(3, &[("SP500", Some(121.0)), ("PCE", Some(122.0)), ("GOLD", Some(2200.0))]),
        ]
    }

    #[test]
    fn test_denominator_parse_and_display() {
        assert_eq!("gold".parse::<Denominator>().unwrap(), Denominator::Gold);
        assert_eq!("HOUSES".parse::<Denominator>().unwrap(), Denominator::Houses);
        assert_eq!(Denominator::Pce.to_string(), "PCE");
        assert!("EUR".parse::<Denominator>().is_err());
    }

    #[test]
    fn test_time_range_parse() {
        assert_eq!("all".parse::<TimeRange>().unwrap(), TimeRange::All);
        assert_eq!("60".parse::<TimeRange>().unwrap(), TimeRange::Months(60));
        assert_eq!("12m".parse::<TimeRange>().unwrap(), TimeRange::Months(12));
        assert!("0".parse::<TimeRange>().is_err());
        assert!("forever".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_usd_is_identity_without_indexing() {
        let rows = vec![row(1, &[("SP500", Some(4783.123456789))])];
        let chart = transform(&rows, &keys(&["SP500"]), Denominator::Usd, false);
        assert_eq!(chart[0].get("SP500"), Some(4783.123456789));
    }

    #[test]
    fn test_usd_indexed_scenario() {
        let chart = transform(&reference_rows(), &keys(&["SP500"]), Denominator::Usd, true);
        assert_eq!(
            values(&chart, "SP500"),
            vec![Some(100.0), Some(110.0), Some(121.0)]
        );
    }

    #[test]
    fn test_pce_scenario_uses_last_row_of_window() {
        let chart = transform(&reference_rows(), &keys(&["SP500"]), Denominator::Pce, false);
        assert_eq!(
            values(&chart, "SP500"),
            vec![Some(101.6667), Some(110.9091), Some(121.0)]
        );
    }

    #[test]
    fn test_pce_latest_depends_on_window() {
        let rows = reference_rows();
        let params = TransformParams {
            denominator: Denominator::Pce,
            range: TimeRange::Months(2),
            indexed: false,
        };
        let chart = chart_rows(&rows[..2], &keys(&["SP500"]), params);
        // Window ends in February, so February dollars are the unit
        assert_eq!(values(&chart, "SP500"), vec![Some(100.8333), Some(110.0)]);
    }

    #[test]
    fn test_pce_latest_skips_unpublished_last_month() {
        let mut rows = reference_rows();
        rows.push(row(4, &[("SP500", Some(130.0)), ("PCE", None)]));
        assert_eq!(latest_pce(&rows), Some(122.0));
        let chart = transform(&rows, &keys(&["SP500"]), Denominator::Pce, false);
        assert_eq!(chart[2].get("SP500"), Some(121.0));
        assert_eq!(chart[3].get("SP500"), None);
    }

    #[test]
    fn test_gold_missing_divisor_is_null() {
        let chart = transform(&reference_rows(), &keys(&["SP500"]), Denominator::Gold, false);
        assert_eq!(
            values(&chart, "SP500"),
            vec![Some(0.05), None, Some(0.055)]
        );
    }

    #[test]
    fn test_houses_scales_by_hundred_and_zero_divisor_is_null() {
        let rows = vec![
            row(1, &[("SP500", Some(300.0)), ("CASE_SHILLER", Some(250.0))]),
            row(2, &[("SP500", Some(300.0)), ("CASE_SHILLER", Some(0.0))]),
        ];
        let chart = transform(&rows, &keys(&["SP500"]), Denominator::Houses, false);
        assert_eq!(values(&chart, "SP500"), vec![Some(120.0), None]);
    }

    #[test]
    fn test_indexing_base_is_first_non_null_per_asset() {
        let rows = vec![
            row(1, &[("SP500", Some(50.0)), ("BTC", None)]),
            row(2, &[("SP500", Some(75.0)), ("BTC", Some(3.0))]),
            row(3, &[("SP500", Some(100.0)), ("BTC", Some(4.5))]),
        ];
        let chart = transform(&rows, &keys(&["SP500", "BTC", "NASDAQ"]), Denominator::Usd, true);
        assert_eq!(
            values(&chart, "SP500"),
            vec![Some(100.0), Some(150.0), Some(200.0)]
        );
        assert_eq!(values(&chart, "BTC"), vec![None, Some(100.0), Some(150.0)]);
        assert_eq!(values(&chart, "NASDAQ"), vec![None, None, None]);
    }

    #[test]
    fn test_indexed_gold_base_row_is_hundred() {
        let rows = vec![
            row(1, &[("SP500", Some(4000.0)), ("GOLD", None)]),
            row(2, &[("SP500", Some(4100.0)), ("GOLD", Some(2033.3))]),
            row(3, &[("SP500", Some(4300.0)), ("GOLD", Some(2100.7))]),
        ];
        let chart = transform(&rows, &keys(&["SP500"]), Denominator::Gold, true);
        assert_eq!(chart[0].get("SP500"), None);
        assert!((chart[1].get("SP500").unwrap() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let rows = reference_rows();
        let params = TransformParams {
            denominator: Denominator::Pce,
            range: TimeRange::All,
            indexed: true,
        };
        let first = serde_json::to_string(&chart_rows(&rows, &keys(&["SP500", "GOLD"]), params)).unwrap();
        let second = serde_json::to_string(&chart_rows(&rows, &keys(&["SP500", "GOLD"]), params)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_takes_trailing_rows() {
        let rows = reference_rows();
        assert_eq!(window(&rows, TimeRange::All).len(), 3);
        assert_eq!(window(&rows, TimeRange::Months(2))[0].date.to_string(), "2024-02");
        assert_eq!(window(&rows, TimeRange::Months(12)).len(), 3);
    }
}
