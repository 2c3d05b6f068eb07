//! Persistence gateway for pages, search results and activity.
//!
//! The [`PageStore`] trait covers every storage operation the search flow
//! needs, so the orchestrator can run against SQLite in production and an
//! in-memory map in tests.
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`find_exact`](PageStore::find_exact) | Case-insensitive equality on the normalized query |
//! | [`find_similar`](PageStore::find_similar) | Bidirectional substring match over active pages |
//! | [`create_or_get_page`](PageStore::create_or_get_page) | Idempotent insert keyed by normalized query |
//! | [`create_page_with_results`](PageStore::create_page_with_results) | Create-or-get and ordered results in one transaction |
//! | [`add_search_result`](PageStore::add_search_result) | Attach one positioned source to a page |
//! | [`record_activity`](PageStore::record_activity) | Append a search event |
//! | [`increment_view_count`](PageStore::increment_view_count) | Atomic `+1` on a page's views |
//! | [`record_similar_mapping`](PageStore::record_similar_mapping) | Insert-if-absent similarity mapping |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NewPage, Page, PageMatch, PageRef, SourceRecord, StoredResult};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait PageStore: Send + Sync {
    /// Case-insensitive equality match; at most one page.
    async fn find_exact(&self, normalized_query: &str) -> Result<Option<PageMatch>>;

    /// Active pages whose query contains the input or is contained by it,
    /// most viewed first, at most `limit`.
    async fn find_similar(&self, normalized_query: &str, limit: i64) -> Result<Vec<PageMatch>>;

    /// Returns the page for `page.search_query`, creating it if absent.
    ///
    /// Concurrent callers with the same query must all receive the same id,
    /// and exactly one of them sees `created == true`.
    async fn create_or_get_page(&self, page: &NewPage) -> Result<PageRef>;

    /// Create-or-get plus the page's results in one atomic write.
    ///
    /// `results` are stored at positions `0..n` only when this call created
    /// the page. On error neither the page nor any result is left behind.
    async fn create_page_with_results(
        &self,
        page: &NewPage,
        results: &[SourceRecord],
    ) -> Result<PageRef>;

    async fn add_search_result(
        &self,
        page_id: i64,
        position_index: i64,
        record: &SourceRecord,
    ) -> Result<()>;

    async fn record_activity(
        &self,
        page_id: Option<i64>,
        raw_query: &str,
        action_type: &str,
    ) -> Result<()>;

    async fn increment_view_count(&self, page_id: i64) -> Result<()>;

    async fn record_similar_mapping(
        &self,
        page_id: i64,
        similar_page_id: i64,
        similarity_score: f64,
    ) -> Result<()>;

    async fn get_page(&self, id: i64) -> Result<Option<Page>>;

    /// Results for a page ordered by `position_index`.
    async fn list_results(&self, page_id: i64) -> Result<Vec<StoredResult>>;
}
