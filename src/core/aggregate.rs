//! Fetches every configured series concurrently and assembles the merged response.
use crate::core::calendar::{MergedRow, merge_calendar};
use crate::core::composite::compute_composite;
use crate::core::config::{AppConfig, ProviderKind};
use crate::core::fallback::generate_fallback;
use crate::core::series::{MonthKey, SeriesFetcher, SeriesResult};
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const FALLBACK_SOURCE: &str = "synthetic placeholder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub key: String,
    pub provider: ProviderKind,
    pub id: String,
}

/// One task per tracked series, plus one per composite component that is not
/// already tracked.
pub fn fetch_plan(config: &AppConfig) -> Vec<FetchTask> {
    let mut tasks: Vec<FetchTask> = config
        .series
        .iter()
        .map(|s| FetchTask {
            key: s.key.clone(),
            provider: s.provider,
            id: s.id.clone(),
        })
        .collect();

    for component in config.composite.iter().flat_map(|c| &c.components) {
        if !tasks.iter().any(|t| &t.key == component) {
            tasks.push(FetchTask {
                key: component.clone(),
                provider: ProviderKind::Market,
                id: component.clone(),
            });
        }
    }
    tasks
}

/// Spawns one task per fetch and tags each outcome with its key.
///
/// A failing or panicking fetch becomes `Unavailable` for its own key and never
/// affects the others.
pub async fn fetch_all(
    tasks: &[FetchTask],
    market: Arc<dyn SeriesFetcher>,
    macro_index: Arc<dyn SeriesFetcher>,
    start: NaiveDate,
    on_fetched: &(dyn Fn() + Send + Sync),
) -> BTreeMap<String, SeriesResult> {
    let handles: Vec<_> = tasks
        .iter()
        .map(|task| {
            let fetcher = match task.provider {
                ProviderKind::Market => Arc::clone(&market),
                ProviderKind::Macro => Arc::clone(&macro_index),
            };
            let id = task.id.clone();
            let handle = tokio::spawn(async move { fetcher.fetch_series(&id, start).await });
            async move {
                let result = handle
                    .await
                    .unwrap_or_else(|e| Err(anyhow!("Fetch task for {} failed: {}", task.id, e)));
                on_fetched();
                if let Err(e) = &result {
                    warn!(key = %task.key, id = %task.id, "Series unavailable: {e:#}");
                }
                (task.key.clone(), SeriesResult::from(result))
            }
        })
        .collect();

    join_all(handles).await.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<MergedRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeMap<String, String>>,
    pub last_updated: String,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    fn timestamp(now: DateTime<Utc>) -> String {
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn success(
        data: Vec<MergedRow>,
        sources: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            sources: Some(sources),
            last_updated: Self::timestamp(now),
            is_fallback: false,
            error: None,
        }
    }

    pub fn fallback(config: &AppConfig, now: DateTime<Utc>) -> Self {
        let keys = config.tracked_keys();
        let sources = keys
            .iter()
            .map(|k| (k.clone(), FALLBACK_SOURCE.to_string()))
            .collect();
        ApiResponse {
            is_fallback: true,
            ..Self::success(
                generate_fallback(&keys, MonthKey::of(now.date_naive())),
                sources,
                now,
            )
        }
    }

    pub fn failure(error: &anyhow::Error, now: DateTime<Utc>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            sources: None,
            last_updated: Self::timestamp(now),
            is_fallback: false,
            error: Some(format!("{error:#}")),
        }
    }

    pub fn rows(&self) -> &[MergedRow] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// Fetches, merges and packages everything for one request.
///
/// The response is a fallback when the reference series is unavailable, and a
/// failure only when assembling the fetched data goes wrong.
pub async fn aggregate(
    config: &AppConfig,
    market: Arc<dyn SeriesFetcher>,
    macro_index: Arc<dyn SeriesFetcher>,
    now: DateTime<Utc>,
    on_fetched: &(dyn Fn() + Send + Sync),
) -> ApiResponse {
    let tasks = fetch_plan(config);
    info!("Fetching {} series", tasks.len());
    let results = fetch_all(&tasks, market, macro_index, config.start_date, on_fetched).await;

    if !results
        .get(&config.reference)
        .is_some_and(SeriesResult::is_available)
    {
        warn!(
            "Reference series {} unavailable, serving fallback data",
            config.reference
        );
        return ApiResponse::fallback(config, now);
    }

    match assemble(config, &results) {
        Ok((rows, sources)) => {
            info!("Assembled {} rows", rows.len());
            ApiResponse::success(rows, sources, now)
        }
        Err(e) => {
            error!("Failed to assemble series: {e:#}");
            ApiResponse::failure(&e, now)
        }
    }
}

/// Builds the composite, merges tracked series and labels their sources.
pub fn assemble(
    config: &AppConfig,
    results: &BTreeMap<String, SeriesResult>,
) -> Result<(Vec<MergedRow>, BTreeMap<String, String>)> {
    let dates: Vec<NaiveDate> = results
        .get(&config.reference)
        .and_then(SeriesResult::points)
        .ok_or_else(|| anyhow!("Reference series {} has no data", config.reference))?
        .iter()
        .map(|p| p.date)
        .collect();
    debug!("Calendar has {} reference dates", dates.len());

    let mut tracked = BTreeMap::new();
    let mut sources = BTreeMap::new();
    for series in &config.series {
        let result = results
            .get(&series.key)
            .cloned()
            .unwrap_or_else(|| SeriesResult::unavailable("not fetched"));
        sources.insert(series.key.clone(), source_label(&result, series.source_label()));
        tracked.insert(series.key.clone(), result);
    }

    if let Some(composite) = &config.composite {
        let missing = SeriesResult::unavailable("not fetched");
        let components = composite.components.iter().map(|name| {
            (
                name.as_str(),
                results.get(name).unwrap_or(&missing),
            )
        });
        let result = compute_composite(components, &dates, composite.quorum);
        let label = composite.label.clone().unwrap_or_else(|| {
            format!(
                "Equal-weight composite of {}",
                composite.components.join(", ")
            )
        });
        sources.insert(composite.key.clone(), source_label(&result, label));
        tracked.insert(composite.key.clone(), result);
    }

    Ok((merge_calendar(&tracked, &dates, &config.reference), sources))
}

fn source_label(result: &SeriesResult, label: String) -> String {
    match result {
        SeriesResult::Available(_) => label,
        SeriesResult::Unavailable { reason } => format!("unavailable: {reason}"),
    }
}
