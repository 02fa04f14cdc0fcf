//! Remote data sources for region statistics.
//!
//! `census` talks to the American Community Survey data service, `health`
//! to the CDC 500 Cities resource, and `fetcher` combines both into
//! [`crate::models::RegionRecord`]s.

pub mod census;
pub mod fetcher;
pub mod health;

pub use fetcher::{FailurePolicy, FetchConfig, RegionFetcher};

use thiserror::Error;

/// Errors raised while building a region record.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout or non-success status.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// The payload did not have the expected shape.
    #[error("malformed {source_name} response: {reason}")]
    MalformedResponse { source_name: String, reason: String },
}

impl FetchError {
    pub(crate) fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout_seconds: u64) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out after {}s", timeout_seconds)
        } else if err.is_connect() {
            "cannot connect to host".to_string()
        } else {
            format!("failed to send request: {}", err)
        };
        FetchError::Network {
            url: url.to_string(),
            reason,
        }
    }
}

/// GET `url` with `query` and return the body of a successful response.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    timeout_seconds: u64,
) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e, timeout_seconds))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Network {
            url: url.to_string(),
            reason: format!("HTTP {}: {}", status, body.trim()),
        });
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e, timeout_seconds))
}
