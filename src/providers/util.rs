use anyhow::Error;
use chrono::{NaiveDate, NaiveTime};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "pricedin/0.1";

/// Retries a request a fixed number of times, sleeping `delay_ms` in between.
///
/// Only transport errors are retried. The caller sees the last error once
/// `1 + retries` attempts have failed.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Unix timestamp of midnight UTC on `date`.
pub fn unix_start_of_day(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}
