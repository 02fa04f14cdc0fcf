//! American Community Survey (ACS) 5-year table client.
//!
//! Each table is requested per region and only the first returned row is
//! used. Cells are addressed by fixed keys such as `C349` or `B17001_15_EST`.

use crate::fetch::{get_text, FetchError};
use crate::models::{RegionCounts, RegionKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Age and sex.
pub const AGE_SEX: &str = "S0101";
/// Poverty status in the past 12 months by sex by age.
pub const POVERTY_BY_AGE: &str = "B17001";
/// Nonfamily households by sex of householder by living alone by age.
pub const LIVING_ALONE: &str = "B11010";
/// Employment status.
pub const EMPLOYMENT: &str = "S2301";
/// Educational attainment.
pub const EDUCATION: &str = "S1501";
/// Poverty status.
pub const POVERTY: &str = "S1701";
/// Selected social characteristics.
pub const SOCIAL: &str = "DP02";

/// Tables needed for one region, in request order.
pub const TABLES: [&str; 7] = [
    AGE_SEX,
    POVERTY_BY_AGE,
    LIVING_ALONE,
    EMPLOYMENT,
    EDUCATION,
    POVERTY,
    SOCIAL,
];

#[derive(Debug, Deserialize)]
struct TableResponse {
    data: TableData,
}

#[derive(Debug, Deserialize)]
struct TableData {
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    cells: HashMap<String, Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    value: Value,
}

/// The first row of an ACS table response.
#[derive(Debug)]
pub struct Table {
    code: String,
    cells: HashMap<String, Cell>,
}

impl Table {
    /// Parse a table response body, failing if it has no rows.
    pub fn parse(code: &str, body: &str) -> Result<Self, FetchError> {
        let response: TableResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::malformed(format!("ACS {}", code), e.to_string()))?;

        let row = response
            .data
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::malformed(format!("ACS {}", code), "no rows returned"))?;

        Ok(Self {
            code: code.to_string(),
            cells: row.cells,
        })
    }

    /// Numeric value of a cell.
    pub fn value(&self, key: &str) -> Result<f64, FetchError> {
        let cell = self
            .cells
            .get(key)
            .ok_or_else(|| self.malformed(format!("missing cell {}", key)))?;

        let number = match &cell.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        number.ok_or_else(|| {
            self.malformed(format!("cell {} is not numeric: {}", key, cell.value))
        })
    }

    /// Value of a cell holding a whole, non-negative count.
    pub fn count(&self, key: &str) -> Result<u64, FetchError> {
        let value = self.value(key)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(self.malformed(format!("cell {} is not a count: {}", key, value)));
        }
        Ok(value as u64)
    }

    /// Sum of several count cells.
    pub fn sum(&self, keys: &[&str]) -> Result<u64, FetchError> {
        keys.iter().map(|key| self.count(key)).sum()
    }

    fn malformed(&self, reason: String) -> FetchError {
        FetchError::malformed(format!("ACS {}", self.code), reason)
    }
}

/// The seven tables a region record is built from.
#[derive(Debug)]
pub struct CensusTables {
    pub age_sex: Table,
    pub poverty_by_age: Table,
    pub living_alone: Table,
    pub employment: Table,
    pub education: Table,
    pub poverty: Table,
    pub social: Table,
}

impl CensusTables {
    /// Extract every raw count. Fails on the first missing or bad cell.
    pub fn counts(&self) -> Result<RegionCounts, FetchError> {
        let age = &self.age_sex;
        let older_adults_65_plus = age.count("C349")?;
        let age_55_to_64 = age.sum(&["C145", "C157"])?;

        let poverty_65_plus = self.poverty_by_age.sum(&[
            "B17001_15_EST",
            "B17001_16_EST",
            "B17001_29_EST",
            "B17001_30_EST",
        ])?;
        let above_poverty_65_plus = self.poverty_by_age.sum(&[
            "B17001_44_EST",
            "B17001_45_EST",
            "B17001_58_EST",
            "B17001_59_EST",
        ])?;

        let labor_force = self.employment.count("C1")?;
        let unemployment_rate = self.employment.value("C7")?;

        Ok(RegionCounts {
            total_population: age.count("C1")?,
            older_adults_65_plus,
            older_adults_55_plus: age_55_to_64 + older_adults_65_plus,
            older_adults_50_to_74: age.sum(&["C133", "C145", "C157", "C169", "C181"])?,
            males_65_plus: age.count("C353")?,
            females_65_plus: age.count("C357")?,
            females_50_to_74: age.sum(&["C141", "C153", "C165", "C177", "C189"])?,
            poverty_65_plus,
            known_poverty_status_65_plus: poverty_65_plus + above_poverty_65_plus,
            living_alone_65_plus: self
                .living_alone
                .sum(&["B11010_5_EST", "B11010_12_EST"])?,
            labor_force,
            unemployed_labor_force: labor_force as f64 * (unemployment_rate / 100.0),
            population_25_plus: self.education.count("C61")?,
            no_high_school_25_plus: self.education.sum(&["C73", "C85"])?,
            known_poverty_status: self.poverty.count("C1")?,
            below_poverty: self.poverty.count("C3")?,
            population_5_plus: self.social.count("C398")?,
            limited_english_5_plus: self.social.count("C409")?,
        })
    }
}

/// Settings for [`CensusClient`].
#[derive(Debug, Clone)]
pub struct CensusSettings {
    pub base_url: String,
    pub api_key: String,
    /// Two-digit dataset year, e.g. "17" for the 2017 5-year estimates.
    pub year: String,
    pub max_results: u32,
    pub region_kind: RegionKind,
    pub timeout_seconds: u64,
}

/// Client for the ACS table service.
pub struct CensusClient {
    settings: CensusSettings,
    http_client: reqwest::Client,
}

impl CensusClient {
    pub fn new(settings: CensusSettings, http_client: reqwest::Client) -> Self {
        Self {
            settings,
            http_client,
        }
    }

    /// Build the table URL for a region (query parameters excluded).
    pub fn table_url(&self, table: &str, region_id: &str) -> String {
        format!(
            "{}/{}_5YR/tables/{}/data/{}{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.year,
            table,
            self.settings.region_kind.geo_prefix(),
            region_id
        )
    }

    /// Request and parse one table for a region.
    pub async fn table(&self, table: &str, region_id: &str) -> Result<Table, FetchError> {
        let url = self.table_url(table, region_id);
        debug!("Requesting ACS table {} for region {}", table, region_id);

        let query = [
            ("maxResults", self.settings.max_results.to_string()),
            ("key", self.settings.api_key.clone()),
        ];
        let body = get_text(&self.http_client, &url, &query, self.settings.timeout_seconds).await?;

        Table::parse(table, &body)
    }

    /// Request every table for a region, one after another.
    pub async fn fetch_tables(&self, region_id: &str) -> Result<CensusTables, FetchError> {
        Ok(CensusTables {
            age_sex: self.table(AGE_SEX, region_id).await?,
            poverty_by_age: self.table(POVERTY_BY_AGE, region_id).await?,
            living_alone: self.table(LIVING_ALONE, region_id).await?,
            employment: self.table(EMPLOYMENT, region_id).await?,
            education: self.table(EDUCATION, region_id).await?,
            poverty: self.table(POVERTY, region_id).await?,
            social: self.table(SOCIAL, region_id).await?,
        })
    }
}
