use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";

/// Field holding the month in every merged and chart row.
const ROW_DATE_FIELD: &str = "date";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Market,
    Macro,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SeriesConfig {
    pub key: String,
    pub provider: ProviderKind,
    pub id: String,
    pub label: Option<String>,
    /// Whether the series is drawn as a chart line, not only used as a divisor
    #[serde(default = "default_chart")]
    pub chart: bool,
}

impl SeriesConfig {
    pub fn source_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            let provider = match self.provider {
                ProviderKind::Market => "Yahoo Finance",
                ProviderKind::Macro => "FRED",
            };
            format!("{provider}: {}", self.id)
        })
    }
}

fn default_chart() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CompositeConfig {
    pub key: String,
    pub label: Option<String>,
    pub components: Vec<String>,
    pub quorum: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FredProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub fred: Option<FredProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            fred: Some(FredProviderConfig {
                base_url: "https://api.stlouisfed.org".to_string(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Key of the series whose dates define the calendar
    pub reference: String,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    pub series: Vec<SeriesConfig>,
    pub composite: Option<CompositeConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default()
}

fn market(key: &str, id: &str) -> SeriesConfig {
    SeriesConfig {
        key: key.to_string(),
        provider: ProviderKind::Market,
        id: id.to_string(),
        label: None,
        chart: true,
    }
}

fn macro_index(key: &str, id: &str, chart: bool) -> SeriesConfig {
    SeriesConfig {
        key: key.to_string(),
        provider: ProviderKind::Macro,
        id: id.to_string(),
        label: None,
        chart,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            reference: "SP500".to_string(),
            start_date: default_start_date(),
            series: vec![
                market("SP500", "^GSPC"),
                market("NASDAQ", "^IXIC"),
                market("GOLD", "GC=F"),
                market("BTC", "BTC-USD"),
                macro_index("CASE_SHILLER", "CSUSHPINSA", true),
                macro_index("PCE", "PCEPI", false),
            ],
            composite: Some(CompositeConfig {
                key: "MAG7".to_string(),
                label: Some("Equal-weight Magnificent 7".to_string()),
                components: ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                quorum: 5,
            }),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "pricedin", "pricedin")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let composite_key = self.composite.iter().map(|c| c.key.as_str());
        if let Some(key) = self
            .series
            .iter()
            .map(|s| s.key.as_str())
            .chain(composite_key)
            .find(|key| *key == ROW_DATE_FIELD)
        {
            bail!("Key {} is reserved for the row month", key);
        }
        for series in &self.series {
            if !keys.insert(series.key.as_str()) {
                bail!("Duplicate series key: {}", series.key);
            }
        }
        if !keys.contains(self.reference.as_str()) {
            bail!("Reference series {} is not configured", self.reference);
        }
        if let Some(composite) = &self.composite {
            if !keys.insert(composite.key.as_str()) {
                bail!("Composite key {} clashes with a series key", composite.key);
            }
            if composite.quorum == 0 || composite.quorum > composite.components.len() {
                bail!(
                    "Composite quorum {} must be between 1 and {}",
                    composite.quorum,
                    composite.components.len()
                );
            }
        }
        Ok(())
    }

    /// Keys of every column in a merged row.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.series
            .iter()
            .map(|s| s.key.clone())
            .chain(self.composite.iter().map(|c| c.key.clone()))
            .collect()
    }

    /// Keys drawn as chart lines.
    pub fn asset_keys(&self) -> Vec<String> {
        self.series
            .iter()
            .filter(|s| s.chart)
            .map(|s| s.key.clone())
            .chain(self.composite.iter().map(|c| c.key.clone()))
            .collect()
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn fred_base_url(&self) -> &str {
        self.providers
            .fred
            .as_ref()
            .map_or("https://api.stlouisfed.org", |p| &p.base_url)
    }

    /// FRED key from the environment, else from the config file.
    pub fn fred_api_key(&self) -> Option<String> {
        std::env::var(FRED_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.providers
                    .fred
                    .as_ref()
                    .and_then(|p| p.api_key.clone())
            })
    }
}
