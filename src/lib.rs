pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::chart::ChartOptions;
use crate::cli::ui;
use crate::core::ApiResponse;
use crate::core::aggregate::{aggregate, fetch_plan};
use crate::core::config::AppConfig;
use crate::providers::{FredSeriesProvider, YahooSeriesProvider};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Fetch,
    Chart(ChartOptions),
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        reference = %config.reference,
        series = config.series.len(),
        "Loaded config"
    );
    Ok(config)
}

/// Fetches every configured series from the live providers and aggregates them.
pub async fn fetch_response(
    config: &AppConfig,
    on_fetched: &(dyn Fn() + Send + Sync),
) -> ApiResponse {
    let market = Arc::new(YahooSeriesProvider::new(config.yahoo_base_url()));
    let macro_index = Arc::new(FredSeriesProvider::new(
        config.fred_base_url(),
        config.fred_api_key(),
    ));
    aggregate(config, market, macro_index, Utc::now(), on_fetched).await
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("pricedin starting...");
    let config = load_config(config_path)?;

    let pb = ui::new_progress_bar(fetch_plan(&config).len() as u64);
    let response = fetch_response(&config, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    match command {
        AppCommand::Fetch => cli::fetch::run(&response),
        AppCommand::Chart(options) => cli::chart::run(&config, &response, &options),
    }
}
