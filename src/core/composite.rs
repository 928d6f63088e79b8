//! Equal-weight composite index built from several component series.
use crate::core::series::{SeriesResult, TimePoint};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

/// Running state while walking the canonical calendar.
#[derive(Debug, Default)]
struct CompositeAccumulator {
    bases: Option<Vec<f64>>,
    points: Vec<TimePoint>,
}

/// A component whose value on the base date cannot anchor a relative.
#[derive(Debug)]
struct NonPositiveBase {
    position: usize,
    value: f64,
    date: NaiveDate,
}

/// Builds the composite series on the given canonical dates.
///
/// Components that are unavailable do not count towards `quorum`. Only dates on
/// which every available component has a point are used, and the first such
/// date fixes each component's base value. The composite value is the mean of
/// `value / base` across components, times 100.
///
/// A component with a non-positive base value is dropped and the composite is
/// rebuilt from the rest. Returns `Unavailable` when fewer than `quorum` usable
/// components remain. A quorum with no overlapping dates yields an empty but
/// available series.
pub fn compute_composite<'a, I>(components: I, dates: &[NaiveDate], quorum: usize) -> SeriesResult
where
    I: IntoIterator<Item = (&'a str, &'a SeriesResult)>,
{
    let mut total = 0;
    let mut available: Vec<(&str, HashMap<NaiveDate, f64>)> = components
        .into_iter()
        .inspect(|_| total += 1)
        .filter_map(|(name, result)| result.points().map(|points| (name, date_index(points))))
        .collect();

    loop {
        if available.is_empty() || available.len() < quorum {
            debug!(
                "Composite quorum not met: {} of {} components available, need {}",
                available.len(),
                total,
                quorum
            );
            return SeriesResult::unavailable(format!(
                "only {} of {} components available, quorum is {}",
                available.len(),
                total,
                quorum
            ));
        }

        match accumulate(&available, dates) {
            Ok(points) => return SeriesResult::Available(points),
            Err(NonPositiveBase {
                position,
                value,
                date,
            }) => {
                let (name, _) = available.remove(position);
                warn!(
                    "Dropping composite component {} with non-positive base value {} on {}",
                    name, value, date
                );
            }
        }
    }
}

fn accumulate(
    available: &[(&str, HashMap<NaiveDate, f64>)],
    dates: &[NaiveDate],
) -> Result<Vec<TimePoint>, NonPositiveBase> {
    let accumulator = dates.iter().try_fold(
        CompositeAccumulator::default(),
        |mut acc, date| -> Result<_, NonPositiveBase> {
            let values: Option<Vec<f64>> = available
                .iter()
                .map(|(_, index)| index.get(date).copied())
                .collect();
            let Some(values) = values else {
                return Ok(acc);
            };

            let bases = match acc.bases.take() {
                Some(bases) => bases,
                None => {
                    if let Some(position) = values.iter().position(|base| *base <= 0.0) {
                        return Err(NonPositiveBase {
                            position,
                            value: values[position],
                            date: *date,
                        });
                    }
                    debug!("Composite base date is {}", date);
                    values.clone()
                }
            };

            let mean_relative = values
                .iter()
                .zip(&bases)
                .map(|(value, base)| value / base)
                .sum::<f64>()
                / values.len() as f64;
            acc.points.push(TimePoint::new(*date, mean_relative * 100.0));
            acc.bases = Some(bases);
            Ok(acc)
        },
    )?;

    Ok(accumulator.points)
}

/// Exact-date lookup; the first point wins if a date repeats.
fn date_index(points: &[TimePoint]) -> HashMap<NaiveDate, f64> {
    let mut index = HashMap::with_capacity(points.len());
    for point in points {
        if let Entry::Vacant(slot) = index.entry(point.date) {
            slot.insert(point.value);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 7] = ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA"];

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap())
            .collect()
    }

    fn series(values: &[f64]) -> SeriesResult {
        SeriesResult::Available(
            dates(values.len() as u32)
                .into_iter()
                .zip(values)
                .map(|(d, v)| TimePoint::new(d, *v))
                .collect(),
        )
    }

    fn components(available: usize) -> Vec<(String, SeriesResult)> {
        NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let result = if i < available {
                    let start = 10.0 * (i + 1) as f64;
                    series(&[start, start * 1.1, start * 1.21])
                } else {
                    SeriesResult::unavailable("HTTP error: 500")
                };
                (name.to_string(), result)
            })
            .collect()
    }

    fn run(components: &[(String, SeriesResult)], quorum: usize) -> SeriesResult {
        compute_composite(
            components.iter().map(|(n, r)| (n.as_str(), r)),
            &dates(3),
            quorum,
        )
    }

    #[test]
    fn test_quorum_exactly_met_produces_composite() {
        let result = run(&components(5), 5);
        let points = result.points().expect("composite should be available");
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].value, 100.0);
        assert!((points[1].value - 110.0).abs() < 1e-9);
        assert!((points[2].value - 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_quorum_missed_is_unavailable() {
        let result = run(&components(4), 5);
        match result {
            SeriesResult::Unavailable { reason } => {
                assert_eq!(reason, "only 4 of 7 components available, quorum is 5")
            }
            other => panic!("Expected unavailable composite, got {other:?}"),
        }
    }

    #[test]
    fn test_single_missing_component_uses_remaining_six() {
        let mut parts = components(7);
        parts[3].1 = SeriesResult::unavailable("timeout");
        // Give the remaining components different paths to check the averaging
        parts[0].1 = series(&[50.0, 100.0, 50.0]);
        let result = run(&parts, 5);
        let points = result.points().unwrap();
        assert_eq!(points[0].value, 100.0);
        let expected = (200.0 + 5.0 * 110.0) / 6.0;
        assert!((points[1].value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_dates_are_skipped_and_base_is_first_complete_date() {
        let d = dates(3);
        let a = SeriesResult::Available(vec![
            TimePoint::new(d[0], 10.0),
            TimePoint::new(d[1], 20.0),
            TimePoint::new(d[2], 30.0),
        ]);
        let b = SeriesResult::Available(vec![
            TimePoint::new(d[1], 5.0),
            TimePoint::new(d[2], 10.0),
        ]);
        let result = compute_composite([("A", &a), ("B", &b)], &d, 2);
        let points = result.points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, d[1]);
        assert_eq!(points[0].value, 100.0);
        // (30/20 + 10/5) / 2 * 100
        assert!((points[1].value - 175.0).abs() < 1e-9);
    }

    #[test]
    fn test_quorum_without_overlap_is_empty_but_available() {
        let d = dates(2);
        let a = SeriesResult::Available(vec![TimePoint::new(d[0], 10.0)]);
        let b = SeriesResult::Available(vec![TimePoint::new(d[1], 10.0)]);
        let result = compute_composite([("A", &a), ("B", &b)], &d, 2);
        assert_eq!(result, SeriesResult::Available(Vec::new()));
    }

    #[test]
    fn test_non_positive_base_component_is_dropped() {
        let d = dates(2);
        let a = SeriesResult::Available(vec![TimePoint::new(d[0], 0.0), TimePoint::new(d[1], 1.0)]);
        let b = SeriesResult::Available(vec![TimePoint::new(d[0], 1.0), TimePoint::new(d[1], 2.0)]);
        let c = SeriesResult::Available(vec![TimePoint::new(d[0], 2.0), TimePoint::new(d[1], 2.0)]);
        let result = compute_composite([("A", &a), ("B", &b), ("C", &c)], &d, 2);
        let points = result.points().expect("composite should survive one bad component");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 100.0);
        // (2/1 + 2/2) / 2 * 100
        assert!((points[1].value - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_dropped_component_can_break_quorum() {
        let d = dates(2);
        let a = SeriesResult::Available(vec![TimePoint::new(d[0], -3.0), TimePoint::new(d[1], 1.0)]);
        let b = SeriesResult::Available(vec![TimePoint::new(d[0], 1.0), TimePoint::new(d[1], 2.0)]);
        let result = compute_composite([("A", &a), ("B", &b)], &d, 2);
        assert_eq!(
            result,
            SeriesResult::unavailable("only 1 of 2 components available, quorum is 2")
        );
    }
}
