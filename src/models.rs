//! Core data models for pages, their source results, and activity records.

use serde::{Deserialize, Serialize};

/// Publication status of a page. Only active pages take part in fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Active,
    Inactive,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Active => "active",
            PageStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => PageStatus::Inactive,
            _ => PageStatus::Active,
        }
    }
}

/// A stored page, as returned by lookups.
#[derive(Debug, Clone)]
pub struct PageMatch {
    pub id: i64,
    pub search_query: String,
    pub relevance_score: f64,
    pub view_count: i64,
    pub last_scan_date: i64,
}

/// Fields needed to create a page on the miss path.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub search_query: String,
    pub title: String,
    pub description: String,
    pub html_content: String,
    pub thumbnail_url: Option<String>,
}

/// Result of create-or-get: the page id and whether this call inserted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    pub id: i64,
    pub created: bool,
}

/// Full page row, used by the read-back surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: i64,
    pub search_query: String,
    pub title: String,
    pub description: String,
    pub html_content: String,
    pub thumbnail_url: Option<String>,
    pub relevance_score: f64,
    pub view_count: i64,
    pub last_scan_date: i64,
    pub status: PageStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One source record produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A source record persisted against a page.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub page_id: i64,
    pub position_index: i64,
    #[serde(flatten)]
    pub record: SourceRecord,
}

/// Fixed score recorded for similar-page mappings.
pub const SIMILARITY_SCORE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPageMapping {
    pub page_id: i64,
    pub similar_page_id: i64,
    pub similarity_score: f64,
}

/// Action type recorded for every search request.
pub const ACTION_SEARCH: &str = "search";

/// Append-only activity log entry.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub page_id: Option<i64>,
    pub search_query: String,
    pub action_type: String,
    pub created_at: i64,
}
