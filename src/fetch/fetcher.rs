//! Region record construction.
//!
//! A record is built in two isolated steps: the census tables are fetched and
//! reduced to raw counts, then the health measures are fetched and summed.
//! Percentages are never computed here; they are derived from the finished
//! record on demand.

use crate::fetch::census::{CensusClient, CensusSettings};
use crate::fetch::health::{HealthClient, HealthSettings};
use crate::fetch::FetchError;
use crate::models::RegionRecord;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to do when one region cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run at the first failure.
    #[default]
    Abort,
    /// Log the failure and continue with the remaining regions.
    Skip,
}

/// Configuration for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub census: CensusSettings,
    pub health: HealthSettings,
    /// Regions in flight at once. 1 fetches strictly one after another.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub timeout_seconds: u64,
    pub show_progress: bool,
}

/// A region whose record could not be built.
#[derive(Debug, Error)]
#[error("failed to fetch region {region_id}: {error}")]
pub struct RegionFailure {
    pub region_id: String,
    #[source]
    pub error: FetchError,
}

/// Records built by [`RegionFetcher::fetch_all`], in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<RegionRecord>,
    /// Regions skipped under [`FailurePolicy::Skip`].
    pub failed: Vec<RegionFailure>,
}

/// Builds region records from the census and health services.
pub struct RegionFetcher {
    census: CensusClient,
    health: HealthClient,
    concurrency: usize,
    failure_policy: FailurePolicy,
    show_progress: bool,
}

impl RegionFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "Fetching ACS {}-year tables from {}",
            config.census.year, config.census.base_url
        );

        Ok(Self {
            census: CensusClient::new(config.census, http_client.clone()),
            health: HealthClient::new(config.health, http_client),
            concurrency: config.concurrency.max(1),
            failure_policy: config.failure_policy,
            show_progress: config.show_progress,
        })
    }

    pub fn census(&self) -> &CensusClient {
        &self.census
    }

    pub fn health(&self) -> &HealthClient {
        &self.health
    }

    /// Build the record for one region.
    pub async fn fetch(&self, region_id: &str) -> Result<RegionRecord, FetchError> {
        debug!("Fetching region {}", region_id);

        let tables = self.census.fetch_tables(region_id).await?;
        let counts = tables.counts()?;
        let health = self.health.fetch_measures(region_id).await?;

        Ok(RegionRecord::new(region_id, counts, health))
    }

    /// Build records for every region, keeping input order.
    ///
    /// Under [`FailurePolicy::Abort`] the first failure is returned and no
    /// further regions are requested.
    pub async fn fetch_all(&self, region_ids: &[String]) -> Result<BatchOutcome, RegionFailure> {
        let progress_bar = self.progress_bar(region_ids.len());
        let mut outcome = BatchOutcome::default();

        let mut results = stream::iter(region_ids.iter())
            .map(|region_id| async move { (region_id, self.fetch(region_id).await) })
            .buffered(self.concurrency);

        while let Some((region_id, result)) = results.next().await {
            if let Some(ref pb) = progress_bar {
                pb.set_message(region_id.clone());
                pb.inc(1);
            }

            match result {
                Ok(record) => {
                    debug!("Built record for region {}", region_id);
                    outcome.records.push(record);
                }
                Err(error) => {
                    let failure = RegionFailure {
                        region_id: region_id.clone(),
                        error,
                    };
                    match self.failure_policy {
                        FailurePolicy::Abort => {
                            if let Some(pb) = progress_bar {
                                pb.abandon();
                            }
                            return Err(failure);
                        }
                        FailurePolicy::Skip => {
                            warn!("Skipping region: {}", failure);
                            outcome.failed.push(failure);
                        }
                    }
                }
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("done");
        }

        Ok(outcome)
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionKind;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESOURCE_PATH: &str = "/resource/cdc.json";

    fn config(server: &MockServer, policy: FailurePolicy, concurrency: usize) -> FetchConfig {
        FetchConfig {
            census: CensusSettings {
                base_url: format!("{}/datasets", server.uri()),
                api_key: "test-key".to_string(),
                year: "17".to_string(),
                max_results: 1,
                region_kind: RegionKind::County,
                timeout_seconds: 5,
            },
            health: HealthSettings {
                resource_url: format!("{}{}", server.uri(), RESOURCE_PATH),
                app_token: "test-token".to_string(),
                place_prefix: "3651000-".to_string(),
                limit: 3000,
                timeout_seconds: 5,
            },
            concurrency,
            failure_policy: policy,
            timeout_seconds: 5,
            show_progress: false,
        }
    }

    fn table_body(cells: &[(&str, Value)]) -> Value {
        let cells: serde_json::Map<String, Value> = cells
            .iter()
            .map(|(k, v)| (k.to_string(), json!({ "value": v })))
            .collect();
        json!({ "data": { "rows": [ { "cells": cells } ] } })
    }

    fn region_tables(scale: u64) -> Vec<(&'static str, Value)> {
        let n = |v: u64| json!(v * scale);
        vec![
            (
                "S0101",
                table_body(&[
                    ("C1", n(1000)),
                    ("C349", n(150)),
                    ("C145", n(60)),
                    ("C157", n(50)),
                    ("C133", n(70)),
                    ("C169", n(45)),
                    ("C181", n(35)),
                    ("C353", n(60)),
                    ("C357", n(90)),
                    ("C141", n(36)),
                    ("C153", n(31)),
                    ("C165", n(26)),
                    ("C177", n(22)),
                    ("C189", n(15)),
                ]),
            ),
            (
                "B17001",
                table_body(&[
                    ("B17001_15_EST", n(5)),
                    ("B17001_16_EST", n(4)),
                    ("B17001_29_EST", n(6)),
                    ("B17001_30_EST", n(5)),
                    ("B17001_44_EST", n(30)),
                    ("B17001_45_EST", n(25)),
                    ("B17001_58_EST", n(35)),
                    ("B17001_59_EST", n(30)),
                ]),
            ),
            (
                "B11010",
                table_body(&[("B11010_5_EST", n(20)), ("B11010_12_EST", n(25))]),
            ),
            ("S2301", table_body(&[("C1", n(500)), ("C7", json!(6.5))])),
            (
                "S1501",
                table_body(&[("C61", n(700)), ("C73", n(40)), ("C85", n(30))]),
            ),
            ("S1701", table_body(&[("C1", n(980)), ("C3", n(196))])),
            ("DP02", table_body(&[("C398", n(950)), ("C409", n(190))])),
        ]
    }

    async fn mount_tables(server: &MockServer, region_id: &str, tables: Vec<(&str, Value)>) {
        for (table, body) in tables {
            Mock::given(method("GET"))
                .and(path(format!(
                    "/datasets/17_5YR/tables/{}/data/0500000US{}",
                    table, region_id
                )))
                .and(query_param("key", "test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }
    }

    async fn mount_health(server: &MockServer, region_id: &str) {
        let features = json!([
            {
                "place_tractid": format!("3651000-{}000100", region_id),
                "corem_crudeprev": "12.0",
                "corew_crudeprev": "20.0",
                "colon_screen_crudeprev": "70.0",
                "mammouse_crudeprev": "40.0",
                "teethlost_crudeprev": "15.0"
            },
            {
                "place_tractid": format!("3651000-{}000200", region_id),
                "corem_crudeprev": "12.0",
                "corew_crudeprev": "25.0",
                "colon_screen_crudeprev": "80.0",
                "mammouse_crudeprev": "51.0"
            }
        ]);

        Mock::given(method("GET"))
            .and(path(RESOURCE_PATH))
            .and(query_param(
                "$where",
                format!("starts_with(place_tractid,'3651000-{}')", region_id),
            ))
            .and(query_param("$$app_token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(features))
            .mount(server)
            .await;
    }

    async fn mount_region(server: &MockServer, region_id: &str, scale: u64) {
        mount_tables(server, region_id, region_tables(scale)).await;
        mount_health(server, region_id).await;
    }

    #[tokio::test]
    async fn test_fetch_builds_record() {
        let server = MockServer::start().await;
        mount_region(&server, "36081", 1).await;

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Abort, 1)).unwrap();
        let record = fetcher.fetch("36081").await.unwrap();

        let counts = record.counts();
        assert_eq!(record.region_id(), "36081");
        assert_eq!(counts.total_population, 1000);
        assert_eq!(counts.older_adults_65_plus, 150);
        assert_eq!(counts.older_adults_55_plus, 260);
        assert_eq!(counts.older_adults_50_to_74, 260);
        assert_eq!(counts.females_50_to_74, 130);
        assert_eq!(counts.poverty_65_plus, 20);
        assert_eq!(counts.known_poverty_status_65_plus, 140);
        assert_eq!(counts.living_alone_65_plus, 45);
        assert_eq!(counts.no_high_school_25_plus, 70);
        assert!((counts.unemployed_labor_force - 32.5).abs() < 1e-9);

        let health = record.health();
        assert!((health.core_men - 24.0).abs() < 1e-9);
        assert!((health.colon_screen - 150.0).abs() < 1e-9);
        // Second feature has no tooth loss figure.
        assert!((health.teeth_lost - 15.0).abs() < 1e-9);

        let p = record.percentages();
        assert!((p.older_adults_65_plus - 15.0).abs() < 1e-9);
        assert!((p.core_men - 40.0).abs() < 1e-9);
        assert!((p.core_women - 50.0).abs() < 1e-9);
        assert!((p.mammogram - 70.0).abs() < 1e-9);
        assert!((p.teeth_lost - 10.0).abs() < 1e-9);
        assert!((p.unemployment - 6.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_cell_fails_region() {
        let server = MockServer::start().await;
        let mut tables = region_tables(1);
        tables[5] = ("S1701", table_body(&[("C1", json!(980))]));
        mount_tables(&server, "36005", tables).await;
        mount_health(&server, "36005").await;

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Abort, 1)).unwrap();
        let err = fetcher.fetch("36005").await.unwrap_err();

        assert!(matches!(err, FetchError::MalformedResponse { .. }));
        assert!(err.to_string().contains("C3"));
    }

    #[tokio::test]
    async fn test_http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Abort, 1)).unwrap();
        let err = fetcher.fetch("36081").await.unwrap_err();

        match err {
            FetchError::Network { reason, .. } => assert!(reason.contains("503")),
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_failed_region() {
        let server = MockServer::start().await;
        mount_region(&server, "36081", 1).await;
        // 36047 has no mocks, so every request returns 404.
        mount_region(&server, "36061", 1).await;

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Abort, 1)).unwrap();
        let ids: Vec<String> = ["36081", "36047", "36061"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let failure = fetcher.fetch_all(&ids).await.unwrap_err();

        assert_eq!(failure.region_id, "36047");
        assert!(matches!(failure.error, FetchError::Network { .. }));
    }

    #[tokio::test]
    async fn test_skip_policy_keeps_built_records() {
        let server = MockServer::start().await;
        mount_region(&server, "36081", 1).await;
        let mut broken = region_tables(1);
        broken[0] = ("S0101", json!({ "data": { "rows": [] } }));
        mount_tables(&server, "36047", broken).await;
        mount_health(&server, "36047").await;
        mount_region(&server, "36061", 2).await;

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Skip, 1)).unwrap();
        let ids: Vec<String> = ["36081", "36047", "36061"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcome = fetcher.fetch_all(&ids).await.unwrap();

        let built: Vec<&str> = outcome.records.iter().map(|r| r.region_id()).collect();
        assert_eq!(built, vec!["36081", "36061"]);
        assert_eq!(outcome.records[0].counts().total_population, 1000);
        assert_eq!(outcome.records[1].counts().total_population, 2000);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].region_id, "36047");
    }

    #[tokio::test]
    async fn test_concurrent_fetch_preserves_order() {
        let server = MockServer::start().await;
        let ids: Vec<String> = ["36005", "36047", "36061", "36081", "36085"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for (i, id) in ids.iter().enumerate() {
            mount_region(&server, id, i as u64 + 1).await;
        }

        let fetcher = RegionFetcher::new(config(&server, FailurePolicy::Abort, 3)).unwrap();
        let outcome = fetcher.fetch_all(&ids).await.unwrap();

        let built: Vec<&str> = outcome.records.iter().map(|r| r.region_id()).collect();
        assert_eq!(built, ids.iter().map(|s| s.as_str()).collect::<Vec<_>>());
        assert_eq!(outcome.records[4].counts().total_population, 5000);
        assert!(outcome.failed.is_empty());
    }
}
