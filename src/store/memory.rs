//! In-memory [`PageStore`] for tests and throwaway runs.
//!
//! Uses `Vec`s behind a single `std::sync::Mutex` so create-or-get is
//! atomic with respect to concurrent callers.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ActivityEvent, NewPage, Page, PageMatch, PageRef, PageStatus, SimilarPageMapping,
    SourceRecord, StoredResult,
};

use super::PageStore;

#[derive(Default)]
struct Tables {
    pages: Vec<Page>,
    results: Vec<StoredResult>,
    activity: Vec<ActivityEvent>,
    similar: Vec<SimilarPageMapping>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a page directly, bypassing the generation flow.
    pub fn insert_page(&self, search_query: &str, status: PageStatus, view_count: i64) -> i64 {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.pages.len() as i64 + 1;
        let now = chrono::Utc::now().timestamp();
        tables.pages.push(Page {
            id,
            search_query: search_query.to_string(),
            title: search_query.to_string(),
            description: String::new(),
            html_content: String::new(),
            thumbnail_url: None,
            relevance_score: 0.0,
            view_count,
            last_scan_date: now,
            status,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn page_count(&self) -> usize {
        self.tables.lock().unwrap().pages.len()
    }

    pub fn activity(&self) -> Vec<ActivityEvent> {
        self.tables.lock().unwrap().activity.clone()
    }

    pub fn similar_mappings(&self) -> Vec<SimilarPageMapping> {
        self.tables.lock().unwrap().similar.clone()
    }
}

fn to_match(page: &Page) -> PageMatch {
    PageMatch {
        id: page.id,
        search_query: page.search_query.clone(),
        relevance_score: page.relevance_score,
        view_count: page.view_count,
        last_scan_date: page.last_scan_date,
    }
}

fn create_or_get(tables: &mut Tables, page: &NewPage) -> PageRef {
    let key = page.search_query.to_lowercase();
    if let Some(existing) = tables
        .pages
        .iter()
        .find(|p| p.search_query.to_lowercase() == key)
    {
        return PageRef {
            id: existing.id,
            created: false,
        };
    }

    let id = tables.pages.len() as i64 + 1;
    let now = chrono::Utc::now().timestamp();
    tables.pages.push(Page {
        id,
        search_query: page.search_query.clone(),
        title: page.title.clone(),
        description: page.description.clone(),
        html_content: page.html_content.clone(),
        thumbnail_url: page.thumbnail_url.clone(),
        relevance_score: 0.0,
        view_count: 0,
        last_scan_date: now,
        status: PageStatus::Active,
        created_at: now,
        updated_at: now,
    });
    PageRef { id, created: true }
}

#[async_trait]
impl PageStore for InMemoryStore {
    async fn find_exact(&self, normalized_query: &str) -> Result<Option<PageMatch>> {
        let needle = normalized_query.to_lowercase();
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .pages
            .iter()
            .find(|p| p.search_query.to_lowercase() == needle)
            .map(to_match))
    }

    async fn find_similar(&self, normalized_query: &str, limit: i64) -> Result<Vec<PageMatch>> {
        let needle = normalized_query.to_lowercase();
        let tables = self.tables.lock().unwrap();
        let mut matches: Vec<PageMatch> = tables
            .pages
            .iter()
            .filter(|p| p.status == PageStatus::Active)
            .filter(|p| {
                let stored = p.search_query.to_lowercase();
                stored.contains(&needle) || needle.contains(&stored)
            })
            .map(to_match)
            .collect();
        matches.sort_by(|a, b| b.view_count.cmp(&a.view_count).then(a.id.cmp(&b.id)));
        matches.truncate(limit.max(0) as usize);
        Ok(matches)
    }

    async fn create_or_get_page(&self, page: &NewPage) -> Result<PageRef> {
        let mut tables = self.tables.lock().unwrap();
        Ok(create_or_get(&mut tables, page))
    }

    async fn create_page_with_results(
        &self,
        page: &NewPage,
        results: &[SourceRecord],
    ) -> Result<PageRef> {
        let mut tables = self.tables.lock().unwrap();
        let page_ref = create_or_get(&mut tables, page);
        if page_ref.created {
            for (position, record) in results.iter().enumerate() {
                tables.results.push(StoredResult {
                    page_id: page_ref.id,
                    position_index: position as i64,
                    record: record.clone(),
                });
            }
        }
        Ok(page_ref)
    }

    async fn add_search_result(
        &self,
        page_id: i64,
        position_index: i64,
        record: &SourceRecord,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.results.push(StoredResult {
            page_id,
            position_index,
            record: record.clone(),
        });
        Ok(())
    }

    async fn record_activity(
        &self,
        page_id: Option<i64>,
        raw_query: &str,
        action_type: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.activity.push(ActivityEvent {
            page_id,
            search_query: raw_query.to_string(),
            action_type: action_type.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        });
        Ok(())
    }

    async fn increment_view_count(&self, page_id: i64) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(page) = tables.pages.iter_mut().find(|p| p.id == page_id) {
            page.view_count += 1;
        }
        Ok(())
    }

    async fn record_similar_mapping(
        &self,
        page_id: i64,
        similar_page_id: i64,
        similarity_score: f64,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let exists = tables
            .similar
            .iter()
            .any(|m| m.page_id == page_id && m.similar_page_id == similar_page_id);
        if !exists {
            tables.similar.push(SimilarPageMapping {
                page_id,
                similar_page_id,
                similarity_score,
            });
        }
        Ok(())
    }

    async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.pages.iter().find(|p| p.id == id).cloned())
    }

    async fn list_results(&self, page_id: i64) -> Result<Vec<StoredResult>> {
        let tables = self.tables.lock().unwrap();
        let mut results: Vec<StoredResult> = tables
            .results
            .iter()
            .filter(|r| r.page_id == page_id)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.position_index);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page(query: &str) -> NewPage {
        NewPage {
            search_query: query.to_string(),
            title: query.to_string(),
            description: String::new(),
            html_content: "<p>x</p>".to_string(),
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_or_get_is_idempotent() {
        let store = InMemoryStore::new();
        let a = store.create_or_get_page(&new_page("rust async")).await.unwrap();
        let b = store.create_or_get_page(&new_page("Rust Async")).await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.created);
        assert!(!b.created);
        assert_eq!(store.page_count(), 1);
    }

    #[tokio::test]
    async fn test_results_only_stored_for_new_page() {
        let store = InMemoryStore::new();
        let sources = vec![
            SourceRecord {
                source: "web".into(),
                title: "first".into(),
                url: None,
                snippet: String::new(),
                image_url: None,
            };
            2
        ];

        let created = store
            .create_page_with_results(&new_page("tea"), &sources)
            .await
            .unwrap();
        let again = store
            .create_page_with_results(&new_page("Tea"), &sources)
            .await
            .unwrap();
        assert!(created.created);
        assert!(!again.created);

        let positions: Vec<i64> = store
            .list_results(created.id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.position_index)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_find_similar_skips_inactive_and_orders_by_views() {
        let store = InMemoryStore::new();
        store.insert_page("laptop", PageStatus::Active, 3);
        store.insert_page("gaming laptop", PageStatus::Active, 10);
        store.insert_page("laptop bag", PageStatus::Inactive, 50);

        let found = store.find_similar("laptop", 5).await.unwrap();
        let queries: Vec<&str> = found.iter().map(|m| m.search_query.as_str()).collect();
        assert_eq!(queries, vec!["gaming laptop", "laptop"]);
    }

    #[tokio::test]
    async fn test_similar_mapping_insert_if_absent() {
        let store = InMemoryStore::new();
        store.record_similar_mapping(1, 1, 0.85).await.unwrap();
        store.record_similar_mapping(1, 1, 0.85).await.unwrap();
        assert_eq!(store.similar_mappings().len(), 1);
    }
}
