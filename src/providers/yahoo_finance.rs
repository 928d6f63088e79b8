use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::series::{Series, SeriesFetcher, TimePoint, normalize_points};
use crate::providers::util::{USER_AGENT, unix_start_of_day, with_retry};

/// Monthly bars from the Yahoo Finance chart API.
pub struct YahooSeriesProvider {
    base_url: String,
}

impl YahooSeriesProvider {
    pub fn new(base_url: &str) -> Self {
        YahooSeriesProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

/// Prices each bar with its adjusted close, or its plain close when the
/// adjusted value is missing. Bars with neither are skipped.
fn extract_points(item: &ChartItem) -> Series {
    let (Some(timestamps), Some(indicators)) = (item.timestamp.as_ref(), item.indicators.as_ref())
    else {
        return Vec::new();
    };
    let adjusted = indicators
        .adjclose
        .first()
        .and_then(|a| a.adjclose.as_deref())
        .unwrap_or_default();
    let closes = indicators
        .quote
        .first()
        .and_then(|q| q.close.as_deref())
        .unwrap_or_default();

    let points = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let value = adjusted
                .get(i)
                .copied()
                .flatten()
                .or_else(|| closes.get(i).copied().flatten())?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(TimePoint::new(date, value))
        })
        .collect();
    normalize_points(points)
}

#[async_trait]
impl SeriesFetcher for YahooSeriesProvider {
    #[instrument(
        name = "YahooSeriesFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_series(&self, symbol: &str, start: NaiveDate) -> Result<Series> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1mo&period1={}&period2={}&events=div%2Csplit",
            self.base_url,
            symbol,
            unix_start_of_day(start),
            Utc::now().timestamp()
        );
        debug!("Requesting monthly bars from {}", url);

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Request error for symbol: {symbol}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if let Some(err) = data.chart.error {
            return Err(anyhow!(
                "Yahoo error {} for symbol {}: {}",
                err.code,
                symbol,
                err.description
            ));
        }

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No chart data found for symbol: {}", symbol))?;

        let points = extract_points(&item);
        debug!("Fetched {} monthly points for {}", points.len(), symbol);
        Ok(points)
    }
}
