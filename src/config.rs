//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.regionstats.toml` files.

use crate::fetch::census::CensusSettings;
use crate::fetch::health::HealthSettings;
use crate::fetch::{FailurePolicy, FetchConfig};
use crate::models::RegionKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".regionstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// American Community Survey settings.
    #[serde(default)]
    pub census: CensusConfig,

    /// CDC 500 Cities settings.
    #[serde(default)]
    pub health: HealthConfig,

    /// Output settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether region ids are counties or census tracts.
    #[serde(default)]
    pub region_kind: RegionKind,

    /// Number of regions fetched at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Abort the run or skip a region when its fetch fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            region_kind: RegionKind::default(),
            concurrency: default_concurrency(),
            failure_policy: FailurePolicy::default(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout() -> u64 {
    60
}

/// American Community Survey data service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensusConfig {
    /// Dataset root; tables live under `{year}_5YR/tables/...`.
    #[serde(default = "default_census_url")]
    pub base_url: String,

    /// API access key.
    #[serde(default)]
    pub api_key: String,

    /// Two-digit 5-year dataset code.
    #[serde(default = "default_year")]
    pub year: String,

    /// `maxResults` query parameter.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            base_url: default_census_url(),
            api_key: String::new(),
            year: default_year(),
            max_results: default_max_results(),
        }
    }
}

fn default_census_url() -> String {
    "http://factfinder.census.gov/service/data/v1/en/programs/ACS/datasets".to_string()
}

fn default_year() -> String {
    "17".to_string()
}

fn default_max_results() -> u32 {
    1
}

/// CDC 500 Cities resource settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Resource endpoint.
    #[serde(default = "default_resource_url")]
    pub resource_url: String,

    /// Socrata app token.
    #[serde(default)]
    pub app_token: String,

    /// Place code prepended to region ids in the `place_tractid` filter.
    #[serde(default = "default_place_prefix")]
    pub place_prefix: String,

    /// `$limit` query parameter.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            resource_url: default_resource_url(),
            app_token: String::new(),
            place_prefix: default_place_prefix(),
            limit: default_limit(),
        }
    }
}

fn default_resource_url() -> String {
    "https://chronicdata.cdc.gov/resource/47z2-4wuh.json".to_string()
}

fn default_place_prefix() -> String {
    // New York City
    "3651000-".to_string()
}

fn default_limit() -> u32 {
    3000
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated table (default)
    #[default]
    Csv,
    /// JSON report with metadata and aggregate
    Json,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Output format.
    #[serde(default)]
    pub format: ExportFormat,

    /// Append the aggregate as a final `Total` row.
    #[serde(default)]
    pub include_total: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: ExportFormat::default(),
            include_total: false,
        }
    }
}

fn default_output() -> String {
    "region_stats.csv".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(kind) = args.kind {
            self.general.region_kind = kind;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }
        if args.skip_failed {
            self.general.failure_policy = FailurePolicy::Skip;
        }

        if let Some(ref year) = args.year {
            self.census.year = year.clone();
        }
        if let Some(ref url) = args.census_url {
            self.census.base_url = url.clone();
        }
        if let Some(ref key) = args.census_key {
            self.census.api_key = key.clone();
        }

        if let Some(ref url) = args.health_url {
            self.health.resource_url = url.clone();
        }
        if let Some(ref token) = args.app_token {
            self.health.app_token = token.clone();
        }
        if let Some(ref prefix) = args.place_prefix {
            self.health.place_prefix = prefix.clone();
        }

        if let Some(ref output) = args.output {
            self.export.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.export.format = format;
        }
        if args.include_total {
            self.export.include_total = true;
        }
    }

    /// Settings for the region fetcher.
    pub fn fetch_config(&self, show_progress: bool) -> FetchConfig {
        let timeout_seconds = self.general.timeout_seconds;

        FetchConfig {
            census: CensusSettings {
                base_url: self.census.base_url.clone(),
                api_key: self.census.api_key.clone(),
                year: self.census.year.clone(),
                max_results: self.census.max_results,
                region_kind: self.general.region_kind,
                timeout_seconds,
            },
            health: HealthSettings {
                resource_url: self.health.resource_url.clone(),
                app_token: self.health.app_token.clone(),
                place_prefix: self.health.place_prefix.clone(),
                limit: self.health.limit,
                timeout_seconds,
            },
            concurrency: self.general.concurrency,
            failure_policy: self.general.failure_policy,
            timeout_seconds,
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
