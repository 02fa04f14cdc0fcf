//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::ExportFormat;
use crate::models::RegionKind;
use clap::Parser;
use std::path::PathBuf;

/// regionstats - community demographics and health statistics by region
///
/// Pulls American Community Survey tables and CDC 500 Cities health
/// estimates for a list of counties or census tracts, and exports
/// per-region and population-weighted aggregate percentages.
///
/// Examples:
///   regionstats --input counties.txt
///   regionstats --input tracts.txt --kind tract --place-prefix 3651000-
///   regionstats --input counties.txt --include-total --output nyc.csv
///   regionstats --input counties.txt --format json --output nyc.json
///   regionstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// File listing one region id per line
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path
    ///
    /// Defaults to the config file setting, or region_stats.csv
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Whether region ids are county numbers or census tracts
    #[arg(short, long, value_name = "KIND")]
    pub kind: Option<RegionKind>,

    /// Two-digit ACS 5-year dataset code (e.g. 17 for 2017)
    #[arg(short, long, value_name = "YY")]
    pub year: Option<String>,

    /// ACS API access key
    #[arg(long, value_name = "KEY", env = "REGIONSTATS_CENSUS_KEY", hide_env_values = true)]
    pub census_key: Option<String>,

    /// CDC 500 Cities app token
    #[arg(long, value_name = "TOKEN", env = "REGIONSTATS_APP_TOKEN", hide_env_values = true)]
    pub app_token: Option<String>,

    /// ACS dataset root URL
    #[arg(long, value_name = "URL")]
    pub census_url: Option<String>,

    /// CDC 500 Cities resource URL
    #[arg(long, value_name = "URL")]
    pub health_url: Option<String>,

    /// Place code prepended to region ids when filtering CDC features
    #[arg(long, value_name = "PREFIX")]
    pub place_prefix: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .regionstats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (csv, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ExportFormat>,

    /// Append the aggregate over all regions as a final row
    #[arg(long)]
    pub include_total: bool,

    /// Skip regions that fail to fetch instead of aborting
    ///
    /// Exit code 2 when any region was skipped.
    #[arg(long)]
    pub skip_failed: bool,

    /// Number of regions fetched at once (output order is unchanged)
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Read the region list and print the requests without sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .regionstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.is_file() => {
                return Err(format!("Region list not found: {}", input.display()));
            }
            None => return Err("--input is required".to_string()),
            _ => {}
        }

        if let Some(ref year) = self.year {
            if year.len() != 2 || !year.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Year must be a two-digit code like 17, got '{}'", year));
            }
        }

        for url in [&self.census_url, &self.health_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
