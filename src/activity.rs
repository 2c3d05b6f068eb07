//! Best-effort activity recording.
//!
//! Nothing in here can fail a request: store errors are logged and dropped.

use std::sync::Arc;

use tracing::warn;

use crate::models::{ACTION_SEARCH, SIMILARITY_SCORE};
use crate::store::PageStore;

#[derive(Clone)]
pub struct ActivityRecorder {
    store: Arc<dyn PageStore>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, page_id: Option<i64>, raw_query: &str, action_type: &str) {
        if let Err(e) = self
            .store
            .record_activity(page_id, raw_query, action_type)
            .await
        {
            warn!(?page_id, action_type, error = %e, "failed to record activity");
        }
    }

    pub async fn bump_view_count(&self, page_id: i64) {
        if let Err(e) = self.store.increment_view_count(page_id).await {
            warn!(page_id, error = %e, "failed to increment view count");
        }
    }

    /// Search event plus view bump, as done on every hit.
    pub async fn record_hit(&self, page_id: i64, raw_query: &str) {
        self.record(Some(page_id), raw_query, ACTION_SEARCH).await;
        self.bump_view_count(page_id).await;
    }

    pub async fn record_similar(&self, page_id: i64) {
        if let Err(e) = self
            .store
            .record_similar_mapping(page_id, page_id, SIMILARITY_SCORE)
            .await
        {
            warn!(page_id, error = %e, "failed to record similar-page mapping");
        }
    }
}
