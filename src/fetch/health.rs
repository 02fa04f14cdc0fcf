//! CDC 500 Cities client.
//!
//! The resource returns one feature per census tract. Features are selected
//! with a `starts_with` filter on `place_tractid` and their crude prevalence
//! scores are summed into a single [`HealthMeasures`].

use crate::fetch::{get_text, FetchError};
use crate::models::HealthMeasures;
use serde_json::{Map, Value};
use tracing::debug;

const CORE_MEN_KEY: &str = "corem_crudeprev";
const CORE_WOMEN_KEY: &str = "corew_crudeprev";
const COLON_SCREEN_KEY: &str = "colon_screen_crudeprev";
const MAMMOGRAM_KEY: &str = "mammouse_crudeprev";
const TEETH_LOST_KEY: &str = "teethlost_crudeprev";

/// One feature record: a flat object keyed by measure name.
pub type Feature = Map<String, Value>;

/// Parse the response body into feature records.
pub fn parse_features(body: &str) -> Result<Vec<Feature>, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::malformed("CDC 500 Cities", e.to_string()))
}

/// Read a measure from a feature. Absent or null keys count as zero.
fn measure(feature: &Feature, key: &str) -> Result<f64, FetchError> {
    match feature.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FetchError::malformed("CDC 500 Cities", format!("{} out of range", key))),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            FetchError::malformed(
                "CDC 500 Cities",
                format!("{} is not numeric: {:?}", key, s),
            )
        }),
        Some(other) => Err(FetchError::malformed(
            "CDC 500 Cities",
            format!("{} has unexpected value {}", key, other),
        )),
    }
}

/// Sum each measure across all features.
pub fn sum_measures(features: &[Feature]) -> Result<HealthMeasures, FetchError> {
    features.iter().try_fold(HealthMeasures::default(), |mut acc, feature| {
        acc.core_men += measure(feature, CORE_MEN_KEY)?;
        acc.core_women += measure(feature, CORE_WOMEN_KEY)?;
        acc.colon_screen += measure(feature, COLON_SCREEN_KEY)?;
        acc.mammogram += measure(feature, MAMMOGRAM_KEY)?;
        acc.teeth_lost += measure(feature, TEETH_LOST_KEY)?;
        Ok(acc)
    })
}

/// Settings for [`HealthClient`].
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub resource_url: String,
    pub app_token: String,
    /// Place code prepended to the region id, e.g. "3651000-" for New York City.
    pub place_prefix: String,
    pub limit: u32,
    pub timeout_seconds: u64,
}

/// Client for the CDC 500 Cities resource.
pub struct HealthClient {
    settings: HealthSettings,
    http_client: reqwest::Client,
}

impl HealthClient {
    pub fn new(settings: HealthSettings, http_client: reqwest::Client) -> Self {
        Self {
            settings,
            http_client,
        }
    }

    pub fn resource_url(&self) -> &str {
        &self.settings.resource_url
    }

    /// The `$where` clause selecting every feature of a region.
    pub fn where_clause(&self, region_id: &str) -> String {
        format!(
            "starts_with(place_tractid,'{}{}')",
            self.settings.place_prefix, region_id
        )
    }

    /// Fetch the features of a region and sum their measures.
    pub async fn fetch_measures(&self, region_id: &str) -> Result<HealthMeasures, FetchError> {
        let query = [
            ("$$app_token", self.settings.app_token.clone()),
            ("$where", self.where_clause(region_id)),
            ("$order", "place_tractid".to_string()),
            ("$limit", self.settings.limit.to_string()),
        ];

        let body = get_text(
            &self.http_client,
            &self.settings.resource_url,
            &query,
            self.settings.timeout_seconds,
        )
        .await?;

        let features = parse_features(&body)?;
        debug!(
            "Summing {} CDC features for region {}",
            features.len(),
            region_id
        );

        sum_measures(&features)
    }
}
