//! regionstats - Community demographics and health statistics by region
//!
//! A CLI tool that pulls American Community Survey tables and CDC 500 Cities
//! health estimates for a list of counties or census tracts, and exports
//! per-region and population-weighted aggregate percentages.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, fetch failure, export failure, etc.)
//!   2 - Completed, but some regions were skipped (--skip-failed)

mod analysis;
mod cli;
mod config;
mod fetch;
mod input;
mod models;
mod report;

use analysis::RegionCollection;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, ExportFormat, CONFIG_FILE};
use fetch::census::TABLES;
use fetch::RegionFetcher;
use models::{RegionSummary, Report, ReportMetadata};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("regionstats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .regionstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Add your ACS key and CDC app token, or pass them via environment.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fetch, aggregate and export. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let kind = config.general.region_kind;
    let input_path = args
        .input
        .as_deref()
        .context("--input is required")?;

    // Step 1: Read the region list
    let region_ids = input::read_region_ids(input_path, kind)?;
    if region_ids.is_empty() {
        bail!("No region ids found in {}", input_path.display());
    }
    println!(
        "📥 Found {} {} id(s) in {}",
        region_ids.len(),
        kind,
        input_path.display()
    );

    if config.census.api_key.is_empty() {
        warn!("No ACS API key configured; requests may be rejected");
    }
    if config.health.app_token.is_empty() {
        warn!("No CDC app token configured; requests may be throttled");
    }

    let fetcher = RegionFetcher::new(config.fetch_config(!args.quiet))?;

    if args.dry_run {
        return handle_dry_run(&fetcher, &region_ids);
    }

    // Step 2: Build one record per region
    println!(
        "🔬 Retrieving ACS {}-year and CDC 500 Cities data...",
        config.census.year
    );
    let outcome = fetcher.fetch_all(&region_ids).await?;

    let failed_ids: Vec<String> = outcome
        .failed
        .iter()
        .map(|f| f.region_id.clone())
        .collect();
    if outcome.records.is_empty() {
        bail!("Every region failed to fetch; nothing to export");
    }

    // Step 3: Aggregate
    let collection = RegionCollection::new(outcome.records);
    info!("Aggregated {} region records", collection.len());

    // Step 4: Export
    let output = Path::new(&config.export.output);
    println!("\n📝 Writing {}...", output.display());

    match config.export.format {
        ExportFormat::Csv => {
            report::export_csv(output, kind, &collection, config.export.include_total)?;
        }
        ExportFormat::Json => {
            let json_report = Report {
                metadata: ReportMetadata {
                    generated_at: Utc::now(),
                    survey_year: config.census.year.clone(),
                    region_kind: kind,
                    regions_requested: region_ids.len(),
                    regions_exported: collection.len(),
                    regions_failed: failed_ids.clone(),
                    duration_seconds: start_time.elapsed().as_secs_f64(),
                },
                regions: collection
                    .records()
                    .iter()
                    .map(RegionSummary::from)
                    .collect(),
                aggregate: RegionSummary::from(collection.aggregate()),
            };
            report::export_json(output, &json_report)?;
        }
    }

    // Print summary
    println!();
    for line in report::summary_lines(&collection) {
        println!("   {}", line);
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    if !failed_ids.is_empty() {
        eprintln!(
            "\n⚠️  {} region(s) skipped: {}",
            failed_ids.len(),
            failed_ids.join(", ")
        );
        return Ok(2);
    }

    println!("\n✅ Done! Data saved to: {}", output.display());
    Ok(0)
}

/// Handle --dry-run: print the requests each region would make, exit.
fn handle_dry_run(fetcher: &RegionFetcher, region_ids: &[String]) -> Result<i32> {
    println!("\n🔍 Dry run: no requests will be sent.\n");

    for region_id in region_ids {
        println!("   Region {}", region_id);
        for table in TABLES {
            println!("     GET {}", fetcher.census().table_url(table, region_id));
        }
        println!(
            "     GET {} where {}",
            fetcher.health().resource_url(),
            fetcher.health().where_clause(region_id)
        );
    }

    println!("\n✅ Dry run complete. {} region(s) listed.", region_ids.len());
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
