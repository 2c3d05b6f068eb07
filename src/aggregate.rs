//! Content aggregation client.
//!
//! Aggregation (searching and scraping external sources) lives in a separate
//! service. This module only defines the [`ContentAggregator`] seam and an
//! HTTP client for it.
//!
//! # Wire format
//!
//! ```text
//! POST <aggregation.endpoint>
//! { "query": "best laptop", "offset": 0 }
//!
//! 200 OK
//! [ { "source": "web", "title": "...", "url": "...", "snippet": "...", "image_url": null }, ... ]
//! ```
//!
//! A `{ "results": [...] }` envelope is accepted as well.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AggregationConfig;
use crate::models::SourceRecord;

/// Produces the ordered source records a page is generated from.
///
/// Order matters: it becomes each result's `position_index`.
#[async_trait]
pub trait ContentAggregator: Send + Sync {
    async fn aggregate(&self, normalized_query: &str, offset: usize) -> Result<Vec<SourceRecord>>;
}

/// Used when no endpoint is configured. Every call fails.
pub struct UnconfiguredAggregator;

#[async_trait]
impl ContentAggregator for UnconfiguredAggregator {
    async fn aggregate(&self, _normalized_query: &str, _offset: usize) -> Result<Vec<SourceRecord>> {
        bail!("aggregation.endpoint is not configured")
    }
}

pub struct HttpAggregator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAggregator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AggregateResponse {
    Bare(Vec<SourceRecord>),
    Envelope { results: Vec<SourceRecord> },
}

impl AggregateResponse {
    fn into_records(self) -> Vec<SourceRecord> {
        match self {
            AggregateResponse::Bare(r) | AggregateResponse::Envelope { results: r } => r,
        }
    }
}

#[async_trait]
impl ContentAggregator for HttpAggregator {
    async fn aggregate(&self, normalized_query: &str, offset: usize) -> Result<Vec<SourceRecord>> {
        let body = serde_json::json!({
            "query": normalized_query,
            "offset": offset,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("aggregator request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("aggregator returned {}: {}", status, text);
        }

        let parsed: AggregateResponse = response
            .json()
            .await
            .context("aggregator response is not a list of sources")?;
        Ok(parsed.into_records())
    }
}

/// Builds the aggregator described by `[aggregation]`.
pub fn create_aggregator(config: &AggregationConfig) -> Result<Box<dyn ContentAggregator>> {
    match &config.endpoint {
        Some(endpoint) => Ok(Box::new(HttpAggregator::new(
            endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Box::new(UnconfiguredAggregator)),
    }
}
