use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::series::{Series, SeriesFetcher, TimePoint, normalize_points};
use crate::providers::util::{USER_AGENT, with_retry};

/// FRED reports unpublished observations with this value.
const MISSING_VALUE: &str = ".";

/// Monthly index levels from the FRED observations API.
pub struct FredSeriesProvider {
    base_url: String,
    api_key: Option<String>,
}

impl FredSeriesProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        FredSeriesProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FredObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

fn parse_observations(observations: Vec<FredObservation>, series_id: &str) -> Series {
    let points = observations
        .into_iter()
        .filter(|obs| obs.value.trim() != MISSING_VALUE)
        .filter_map(|obs| {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d");
            let value = obs.value.trim().parse::<f64>();
            match (date, value) {
                (Ok(date), Ok(value)) => Some(TimePoint::new(date, value)),
                _ => {
                    debug!(
                        "Skipping unparseable observation for {}: {} = {}",
                        series_id, obs.date, obs.value
                    );
                    None
                }
            }
        })
        .collect();
    normalize_points(points)
}

#[async_trait]
impl SeriesFetcher for FredSeriesProvider {
    #[instrument(
        name = "FredSeriesFetch",
        skip(self),
        fields(series_id = %series_id)
    )]
    async fn fetch_series(&self, series_id: &str, start: NaiveDate) -> Result<Series> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("FRED API key is not configured for series: {}", series_id);
        };

        let url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json&observation_start={}",
            self.base_url,
            series_id,
            api_key,
            start.format("%Y-%m-%d")
        );
        debug!(
            "Requesting observations for {} from {}",
            series_id, self.base_url
        );

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to send request for series: {series_id}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for series: {}",
                response.status(),
                series_id
            ));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for series: {series_id}"))?;
        let data: FredObservationsResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse FRED response for {}: {}", series_id, e))?;

        let points = parse_observations(data.observations, series_id);
        debug!("Fetched {} observations for {}", points.len(), series_id);
        Ok(points)
    }
}
