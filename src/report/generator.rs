//! Table and report generation.
//!
//! The CSV table has a fixed header and one row per region, optionally
//! followed by the aggregate row. Counts render as integers, percentages with
//! one decimal digit, and summed crude prevalence scores unrounded.

use crate::analysis::RegionCollection;
use crate::models::{RegionKind, RegionRecord, Report};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

/// Column titles following the region id column, in output order.
pub const COLUMN_TITLES: [&str; 36] = [
    "Total Population",
    "Total Older Adults Age 65+",
    "Percentage of Population Who Are Older Adults Age 65+",
    "Total Older Adults Age 55+",
    "Percentage of Population Who Are Older Adults Age 55+",
    "Total Older Adults Age 65+ With Known Poverty Status",
    "Older Adults Age 65+ Below Poverty Level",
    "Percentage of Older Adults Age 65+ Below Poverty Level",
    "Older Adults Age 65+ Living Alone",
    "Percentage of Older Adults Age 65+ Living Alone",
    "Total Population Age 5+",
    "Residents Age 5+ with Limited English Proficiency",
    "Percentage of Residents with Limited English Proficiency",
    "Total Population with Known Poverty Status",
    "Residents Below Poverty Level",
    "Percentage of Residents Below Poverty Level",
    "Total Population Age 25+",
    "Residents Age 25+ without a High School Diploma or Equivalency",
    "Percentage of Residents Age 25+ without a High School Diploma",
    "Total Labor Force Age 16+",
    "Unemployed Residents",
    "Unemployment Rate",
    "Total Males 65+",
    "Number of Older Adult Men Age 65+ Who Are Up to Date on Core Set of Clinical Preventive Services",
    "Percentage of Older Men Age 65+ Who Are Up to Date on Core Set of Clinical Preventive Services",
    "Total Females 65+",
    "Number of Older Adult Women Age 65+ Who Are Up to Date on Core Set of Clinical Preventive Services",
    "Percentage of Older Women Age 65+ Who Are Up to Date on Core Set of Clinical Preventive Services",
    "Total Older Adults 50-74",
    "Older Adults Age 50-75 Fecal Occult Blood Test Sigmoidoscopy or Colonoscopy",
    "Percentage of Older Adults Age 50-75 Fecal Occult Blood Test Sigmoidoscopy or Colonoscopy",
    "Total Females 50-74",
    "Women Age 50-75 Mammogram Use",
    "Percentage of Women Age 50-75 Mammogram Use",
    "Older Adults Age 65+ With All Teeth Lost",
    "Percentage of Older Adults Age 65+ With All Teeth Lost",
];

/// Errors raised while writing an output file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Header row for a table of `kind` regions.
pub fn header(kind: RegionKind) -> Vec<String> {
    std::iter::once(kind.column_title())
        .chain(COLUMN_TITLES)
        .map(String::from)
        .collect()
}

fn pct(value: f64) -> String {
    format!("{:.1}", value)
}

/// Shortest representation that round-trips, always with a decimal point.
fn score(value: f64) -> String {
    format!("{:?}", value)
}

/// One table row for a record, matching [`header`].
pub fn csv_row(record: &RegionRecord) -> Vec<String> {
    let c = record.counts();
    let h = record.health();
    let p = record.percentages();

    vec![
        record.region_id().to_string(),
        c.total_population.to_string(),
        c.older_adults_65_plus.to_string(),
        pct(p.older_adults_65_plus),
        c.older_adults_55_plus.to_string(),
        pct(p.older_adults_55_plus),
        c.known_poverty_status_65_plus.to_string(),
        c.poverty_65_plus.to_string(),
        pct(p.poverty_65_plus),
        c.living_alone_65_plus.to_string(),
        pct(p.living_alone_65_plus),
        c.population_5_plus.to_string(),
        c.limited_english_5_plus.to_string(),
        pct(p.limited_english),
        c.known_poverty_status.to_string(),
        c.below_poverty.to_string(),
        pct(p.below_poverty),
        c.population_25_plus.to_string(),
        c.no_high_school_25_plus.to_string(),
        pct(p.no_high_school),
        c.labor_force.to_string(),
        format!("{:.1}", c.unemployed_labor_force),
        pct(p.unemployment),
        c.males_65_plus.to_string(),
        score(h.core_men),
        pct(p.core_men),
        c.females_65_plus.to_string(),
        score(h.core_women),
        pct(p.core_women),
        c.older_adults_50_to_74.to_string(),
        score(h.colon_screen),
        pct(p.colon_screen),
        c.females_50_to_74.to_string(),
        score(h.mammogram),
        pct(p.mammogram),
        score(h.teeth_lost),
        pct(p.teeth_lost),
    ]
}

/// Write the header and one row per record to `writer`.
pub fn write_csv<W: Write>(
    writer: W,
    kind: RegionKind,
    records: &[RegionRecord],
    aggregate: Option<&RegionRecord>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(header(kind))?;
    for record in records.iter().chain(aggregate) {
        writer.write_record(csv_row(record))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the collection as CSV to `path`, truncating any existing file.
pub fn export_csv(
    path: &Path,
    kind: RegionKind,
    collection: &RegionCollection,
    include_total: bool,
) -> Result<(), ExportError> {
    info!("Exporting {} regions to {}", collection.len(), path.display());

    let file = File::create(path).map_err(|source| {
        error!("Cannot open {} for writing: {}", path.display(), source);
        ExportError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let aggregate = include_total.then(|| collection.aggregate());
    write_csv(file, kind, collection.records(), aggregate).map_err(|source| {
        error!("Error writing to file {}: {}", path.display(), source);
        ExportError::Csv {
            path: path.to_path_buf(),
            source,
        }
    })?;

    info!("Finished writing {}", path.display());
    Ok(())
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, ExportError> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a JSON report to `path`, truncating any existing file.
pub fn export_json(path: &Path, report: &Report) -> Result<(), ExportError> {
    let content = generate_json_report(report)?;

    let mut file = File::create(path).map_err(|source| {
        error!("Cannot open {} for writing: {}", path.display(), source);
        ExportError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    file.write_all(content.as_bytes()).map_err(|source| {
        error!("Error writing to file {}: {}", path.display(), source);
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;

    Ok(())
}

/// Console summary of the aggregate health percentages.
pub fn summary_lines(collection: &RegionCollection) -> Vec<String> {
    let p = collection.aggregate().percentages();

    vec![
        format!(
            "Summary of descriptive statistics for the given {} region(s):",
            collection.len()
        ),
        format!(
            "Percentage of older males age 65+ who received core preventive services: {:.1}%",
            p.core_men
        ),
        format!(
            "Percentage of older females age 65+ who received core preventive services: {:.1}%",
            p.core_women
        ),
        format!(
            "Percentage of older adults age 50-75 who received a colon screening: {:.1}%",
            p.colon_screen
        ),
        format!(
            "Percentage of older females age 50-74 who received a mammogram: {:.1}%",
            p.mammogram
        ),
        format!(
            "Percentage of older adults age 65+ who have all teeth lost: {:.1}%",
            p.teeth_lost
        ),
    ]
}
