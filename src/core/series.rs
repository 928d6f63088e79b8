//! Time series primitives shared by providers and the aggregation pipeline

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        TimePoint { date, value }
    }
}

pub type Series = Vec<TimePoint>;

/// Outcome of fetching one series.
///
/// A failed fetch is `Unavailable`. An `Available` series may still hold zero
/// points, e.g. when the instrument has no history in the requested range.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesResult {
    Available(Series),
    Unavailable { reason: String },
}

impl SeriesResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SeriesResult::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SeriesResult::Available(_))
    }

    pub fn points(&self) -> Option<&[TimePoint]> {
        match self {
            SeriesResult::Available(points) => Some(points),
            SeriesResult::Unavailable { .. } => None,
        }
    }
}

impl From<Result<Series>> for SeriesResult {
    fn from(result: Result<Series>) -> Self {
        match result {
            Ok(points) => SeriesResult::Available(points),
            Err(e) => SeriesResult::unavailable(format!("{e:#}")),
        }
    }
}

/// Calendar month used to join series that report different days of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(anyhow!("Invalid month {} for year {}", month, year));
        }
        Ok(MonthKey { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Steps back `months` calendar months.
    pub fn minus_months(&self, months: u32) -> Self {
        let total = self.year * 12 + (self.month as i32 - 1) - months as i32;
        MonthKey {
            year: total.div_euclid(12),
            month: total.rem_euclid(12) as u32 + 1,
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("Invalid month key: {}", s))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| anyhow!("Invalid month key: {}", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid month key: {}", s))?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Indexes a series by month. When several points fall in the same month the
/// first one in source order wins.
pub fn month_index(points: &[TimePoint]) -> HashMap<MonthKey, f64> {
    let mut index = HashMap::with_capacity(points.len());
    for point in points {
        if let Entry::Vacant(slot) = index.entry(MonthKey::of(point.date)) {
            slot.insert(point.value);
        }
    }
    index
}

/// Sorts points by date, dropping non-finite values and repeated dates.
pub fn normalize_points(mut points: Vec<TimePoint>) -> Series {
    points.retain(|p| p.value.is_finite());
    // Stable sort keeps source order among equal dates
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    points
}

#[async_trait]
pub trait SeriesFetcher: Send + Sync {
    async fn fetch_series(&self, id: &str, start: NaiveDate) -> Result<Series>;
}
