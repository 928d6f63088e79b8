//! Synthetic placeholder rows served when the reference series cannot be fetched.
use crate::core::calendar::MergedRow;
use crate::core::series::MonthKey;
use crate::core::transform::round4;

/// Number of months in a fallback response.
pub const FALLBACK_MONTHS: usize = 60;

/// Starting level and monthly growth for a placeholder series.
fn placeholder(key: &str) -> (f64, f64) {
    match key {
        "SP500" => (3000.0, 0.008),
        "NASDAQ" => (9000.0, 0.010),
        "GOLD" => (1500.0, 0.006),
        "BTC" => (10000.0, 0.020),
        "CASE_SHILLER" => (220.0, 0.005),
        "PCE" => (110.0, 0.002),
        "MAG7" => (100.0, 0.015),
        _ => (100.0, 0.005),
    }
}

/// Generates `FALLBACK_MONTHS` rows ending at `end`, with every key populated.
pub fn generate_fallback(keys: &[String], end: MonthKey) -> Vec<MergedRow> {
    (0..FALLBACK_MONTHS)
        .map(|i| {
            let date = end.minus_months((FALLBACK_MONTHS - 1 - i) as u32);
            let values = keys
                .iter()
                .map(|key| {
                    let (base, growth) = placeholder(key);
                    let value = round4(base * (1.0 + growth).powi(i as i32));
                    (key.clone(), Some(value))
                })
                .collect();
            MergedRow { date, values }
        })
        .collect()
}
