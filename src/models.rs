//! Data models for regional statistics.
//!
//! A region record only stores raw figures pulled from the source tables.
//! Every percentage is derived from those figures on demand, so a record and
//! the aggregate over many records always share the same formulas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Geographic unit a region identifier refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Census Bureau county number (e.g. 36081 for Queens).
    #[default]
    County,
    /// Census tract identifier.
    Tract,
}

impl RegionKind {
    /// ACS geography prefix placed in front of the region id.
    pub fn geo_prefix(&self) -> &'static str {
        match self {
            RegionKind::County => "0500000US",
            RegionKind::Tract => "1400000US",
        }
    }

    /// Title of the first column in exported tables.
    pub fn column_title(&self) -> &'static str {
        match self {
            RegionKind::County => "County Number",
            RegionKind::Tract => "Census Tract",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::County => write!(f, "county"),
            RegionKind::Tract => write!(f, "tract"),
        }
    }
}

/// Population counts taken from the American Community Survey tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub total_population: u64,

    // Older adult population
    pub older_adults_65_plus: u64,
    pub older_adults_55_plus: u64,
    pub older_adults_50_to_74: u64,
    pub males_65_plus: u64,
    pub females_65_plus: u64,
    pub females_50_to_74: u64,
    pub poverty_65_plus: u64,
    pub known_poverty_status_65_plus: u64,
    pub living_alone_65_plus: u64,

    // Community needs
    pub labor_force: u64,
    /// Labor force times the published unemployment rate, hence fractional.
    pub unemployed_labor_force: f64,
    pub population_25_plus: u64,
    pub no_high_school_25_plus: u64,
    pub known_poverty_status: u64,
    pub below_poverty: u64,
    pub population_5_plus: u64,
    pub limited_english_5_plus: u64,
}

impl AddAssign for RegionCounts {
    fn add_assign(&mut self, other: Self) {
        self.total_population += other.total_population;
        self.older_adults_65_plus += other.older_adults_65_plus;
        self.older_adults_55_plus += other.older_adults_55_plus;
        self.older_adults_50_to_74 += other.older_adults_50_to_74;
        self.males_65_plus += other.males_65_plus;
        self.females_65_plus += other.females_65_plus;
        self.females_50_to_74 += other.females_50_to_74;
        self.poverty_65_plus += other.poverty_65_plus;
        self.known_poverty_status_65_plus += other.known_poverty_status_65_plus;
        self.living_alone_65_plus += other.living_alone_65_plus;
        self.labor_force += other.labor_force;
        self.unemployed_labor_force += other.unemployed_labor_force;
        self.population_25_plus += other.population_25_plus;
        self.no_high_school_25_plus += other.no_high_school_25_plus;
        self.known_poverty_status += other.known_poverty_status;
        self.below_poverty += other.below_poverty;
        self.population_5_plus += other.population_5_plus;
        self.limited_english_5_plus += other.limited_english_5_plus;
    }
}

impl Add for RegionCounts {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for RegionCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Crude prevalence scores from the CDC 500 Cities data set, summed over
/// every sub-area that matched the region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMeasures {
    /// Men 65+ up to date on core clinical preventive services.
    pub core_men: f64,
    /// Women 65+ up to date on core clinical preventive services.
    pub core_women: f64,
    /// Adults 50-75 with a fecal occult blood test, sigmoidoscopy or colonoscopy.
    pub colon_screen: f64,
    /// Women 50-74 with mammography use.
    pub mammogram: f64,
    /// Adults 65+ with all teeth lost.
    pub teeth_lost: f64,
}

impl AddAssign for HealthMeasures {
    fn add_assign(&mut self, other: Self) {
        self.core_men += other.core_men;
        self.core_women += other.core_women;
        self.colon_screen += other.colon_screen;
        self.mammogram += other.mammogram;
        self.teeth_lost += other.teeth_lost;
    }
}

impl Add for HealthMeasures {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for HealthMeasures {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// `numerator / denominator * 100`, or `0.0` when the denominator is zero.
///
/// A zero denominator is ordinary data (a tract with no women aged 50-74),
/// so it yields the sentinel instead of NaN or infinity.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// Percentages derived from a [`RegionCounts`] and [`HealthMeasures`] pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentages {
    pub older_adults_65_plus: f64,
    pub older_adults_55_plus: f64,
    pub poverty_65_plus: f64,
    pub living_alone_65_plus: f64,
    pub limited_english: f64,
    pub below_poverty: f64,
    pub no_high_school: f64,
    pub unemployment: f64,
    pub core_men: f64,
    pub core_women: f64,
    pub colon_screen: f64,
    pub mammogram: f64,
    pub teeth_lost: f64,
}

impl Percentages {
    /// Derive every percentage from raw figures.
    pub fn derive(counts: &RegionCounts, health: &HealthMeasures) -> Self {
        let c = counts;
        Self {
            older_adults_65_plus: percentage(
                c.older_adults_65_plus as f64,
                c.total_population as f64,
            ),
            older_adults_55_plus: percentage(
                c.older_adults_55_plus as f64,
                c.total_population as f64,
            ),
            poverty_65_plus: percentage(
                c.poverty_65_plus as f64,
                c.known_poverty_status_65_plus as f64,
            ),
            // Householders living alone over all older adults, as published.
            living_alone_65_plus: percentage(
                c.living_alone_65_plus as f64,
                c.older_adults_65_plus as f64,
            ),
            limited_english: percentage(
                c.limited_english_5_plus as f64,
                c.population_5_plus as f64,
            ),
            below_poverty: percentage(c.below_poverty as f64, c.known_poverty_status as f64),
            no_high_school: percentage(
                c.no_high_school_25_plus as f64,
                c.population_25_plus as f64,
            ),
            unemployment: percentage(c.unemployed_labor_force, c.labor_force as f64),
            core_men: percentage(health.core_men, c.males_65_plus as f64),
            core_women: percentage(health.core_women, c.females_65_plus as f64),
            colon_screen: percentage(health.colon_screen, c.older_adults_50_to_74 as f64),
            mammogram: percentage(health.mammogram, c.females_50_to_74 as f64),
            teeth_lost: percentage(health.teeth_lost, c.older_adults_65_plus as f64),
        }
    }
}

/// Raw statistics for one region. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    region_id: String,
    counts: RegionCounts,
    health: HealthMeasures,
}

impl RegionRecord {
    pub fn new(region_id: impl Into<String>, counts: RegionCounts, health: HealthMeasures) -> Self {
        Self {
            region_id: region_id.into(),
            counts,
            health,
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn counts(&self) -> &RegionCounts {
        &self.counts
    }

    pub fn health(&self) -> &HealthMeasures {
        &self.health
    }

    /// Percentages computed from this record's current raw figures.
    pub fn percentages(&self) -> Percentages {
        Percentages::derive(&self.counts, &self.health)
    }
}

/// Flattened view of a record used by the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region_id: String,
    pub counts: RegionCounts,
    pub health: HealthMeasures,
    pub percentages: Percentages,
}

impl From<&RegionRecord> for RegionSummary {
    fn from(record: &RegionRecord) -> Self {
        Self {
            region_id: record.region_id.clone(),
            counts: record.counts,
            health: record.health,
            percentages: record.percentages(),
        }
    }
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Two-digit ACS 5-year dataset code (e.g. "17").
    pub survey_year: String,
    pub region_kind: RegionKind,
    pub regions_requested: usize,
    pub regions_exported: usize,
    /// Region ids left out because their fetch failed.
    pub regions_failed: Vec<String>,
    pub duration_seconds: f64,
}

/// The complete JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub regions: Vec<RegionSummary>,
    pub aggregate: RegionSummary,
}
