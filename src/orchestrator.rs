//! Search orchestration: reuse an existing page or generate a new one.
//!
//! # Request flow
//!
//! ```text
//! Validating → LookupExact ──found──▶ Respond (200)
//!                   │
//!                   ▼
//!             LookupSimilar ──found──▶ Respond (200, is_similar)
//!                   │
//!                   ▼
//!   Aggregating → Generating → Extracting → Persisting → CachingBestEffort → Respond (201)
//! ```
//!
//! Aggregating, Generating and Persisting must succeed; a failure there ends
//! the request with a server error. Activity recording and the cache write
//! are best-effort and never change the response. Nothing already written is
//! rolled back.
//!
//! The miss path holds a per-query lock and repeats the exact lookup once it
//! has it, so concurrent requests for the same unseen query generate at most
//! one page. The page and its results are written in one transaction with
//! create-or-get semantics, so a page never exists without its results and
//! duplicate rows are impossible even across processes. If another process
//! wins that race, the request answers with the winner's page as `Existing`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::activity::ActivityRecorder;
use crate::aggregate::ContentAggregator;
use crate::cache::{cache_key, CacheEntry, ResultCache};
use crate::config::Config;
use crate::error::SearchError;
use crate::extract::extract_metadata;
use crate::generate::PageGenerator;
use crate::matching::SimilarityPolicy;
use crate::models::{NewPage, PageMatch, SourceRecord, ACTION_SEARCH};
use crate::query::{validate_query, QueryBounds, ValidatedQuery};
use crate::store::PageStore;

pub const MSG_AGGREGATION_FAILED: &str = "Unable to aggregate content";
pub const MSG_GENERATION_FAILED: &str = "Failed to generate page";
pub const MSG_PAGE_SAVE_FAILED: &str = "Failed to save page";

/// Aggregation always starts at the first page of sources.
const AGGREGATION_OFFSET: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    LookupExact,
    LookupSimilar,
    Aggregating,
    Generating,
    Extracting,
    Persisting,
    CachingBestEffort,
    Respond,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::LookupExact => "lookup_exact",
            Stage::LookupSimilar => "lookup_similar",
            Stage::Aggregating => "aggregating",
            Stage::Generating => "generating",
            Stage::Extracting => "extracting",
            Stage::Persisting => "persisting",
            Stage::CachingBestEffort => "caching",
            Stage::Respond => "respond",
        }
    }

    /// Failures in best-effort stages are logged and ignored.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Stage::CachingBestEffort)
    }
}

fn enter(stage: Stage) {
    debug!(
        stage = stage.as_str(),
        best_effort = stage.is_best_effort(),
        "entering stage"
    );
}

/// A page created on the miss path.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPage {
    pub page_id: i64,
    pub title: String,
    pub sources_count: usize,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Existing(PageMatch),
    Similar(PageMatch),
    Created(CreatedPage),
}

impl SearchOutcome {
    pub fn page_id(&self) -> i64 {
        match self {
            SearchOutcome::Existing(m) | SearchOutcome::Similar(m) => m.id,
            SearchOutcome::Created(c) => c.page_id,
        }
    }
}

/// Tunables taken from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub bounds: QueryBounds,
    pub similar_limit: i64,
    pub similarity: SimilarityPolicy,
    pub aggregation_timeout: Duration,
    pub generation_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            bounds: QueryBounds::default(),
            similar_limit: 5,
            similarity: SimilarityPolicy::default(),
            aggregation_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bounds: QueryBounds {
                min_len: config.search.min_query_len,
                max_len: config.search.max_query_len,
            },
            similar_limit: config.search.similar_limit,
            similarity: SimilarityPolicy::from_config(&config.search.similarity),
            aggregation_timeout: Duration::from_secs(config.aggregation.timeout_secs),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
        }
    }
}

type InFlight = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// One request's claim on a query's miss-path lock.
///
/// The map entry is dropped with the last claim, including when the request
/// future is cancelled mid-generation.
struct InFlightSlot<'a> {
    map: &'a InFlight,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn acquire(map: &'a InFlight, normalized_query: &str) -> Self {
        let lock = map
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(normalized_query.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self {
            map,
            key: normalized_query.to_string(),
            lock,
        }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self
            .map
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one held here.
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.key);
        }
    }
}

pub struct SearchOrchestrator {
    store: Arc<dyn PageStore>,
    aggregator: Arc<dyn ContentAggregator>,
    generator: Arc<dyn PageGenerator>,
    cache: Arc<dyn ResultCache>,
    recorder: ActivityRecorder,
    settings: OrchestratorSettings,
    in_flight: InFlight,
}

impl SearchOrchestrator {
    pub fn new(
        store: Arc<dyn PageStore>,
        aggregator: Arc<dyn ContentAggregator>,
        generator: Arc<dyn PageGenerator>,
        cache: Arc<dyn ResultCache>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            recorder: ActivityRecorder::new(store.clone()),
            store,
            aggregator,
            generator,
            cache,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub async fn search(&self, raw_query: &str) -> Result<SearchOutcome, SearchError> {
        let span = info_span!("search", request_id = %Uuid::new_v4());
        self.run(raw_query).instrument(span).await
    }

    async fn run(&self, raw_query: &str) -> Result<SearchOutcome, SearchError> {
        enter(Stage::Validating);
        let query = validate_query(raw_query, self.settings.bounds)?;

        if let Some(outcome) = self.lookup(&query).await? {
            return Ok(outcome);
        }

        let outcome = {
            let slot = InFlightSlot::acquire(&self.in_flight, &query.normalized);
            let _held = slot.lock.lock().await;
            // Another request may have generated the page while we waited.
            match self.lookup_exact(&query).await? {
                Some(outcome) => outcome,
                None => self.generate_page(&query).await?,
            }
        };

        if let SearchOutcome::Created(created) = &outcome {
            info!(
                page_id = created.page_id,
                sources = created.sources_count,
                "generated new page"
            );
        }
        enter(Stage::Respond);
        Ok(outcome)
    }

    async fn lookup(&self, query: &ValidatedQuery) -> Result<Option<SearchOutcome>, SearchError> {
        if let Some(outcome) = self.lookup_exact(query).await? {
            return Ok(Some(outcome));
        }

        enter(Stage::LookupSimilar);
        let policy = &self.settings.similarity;
        if !policy.applies_to(&query.normalized) {
            return Ok(None);
        }
        let candidates = self
            .store
            .find_similar(&query.normalized, self.settings.similar_limit)
            .await?;
        let Some(similar) = policy.select(&query.normalized, &candidates).cloned() else {
            return Ok(None);
        };

        info!(page_id = similar.id, matched = %similar.search_query, "found similar page");
        self.recorder.record_hit(similar.id, &query.raw).await;
        self.recorder.record_similar(similar.id).await;
        Ok(Some(SearchOutcome::Similar(similar)))
    }

    async fn lookup_exact(
        &self,
        query: &ValidatedQuery,
    ) -> Result<Option<SearchOutcome>, SearchError> {
        enter(Stage::LookupExact);
        let Some(existing) = self.store.find_exact(&query.normalized).await? else {
            return Ok(None);
        };

        info!(page_id = existing.id, "found existing page");
        self.recorder.record_hit(existing.id, &query.raw).await;
        Ok(Some(SearchOutcome::Existing(existing)))
    }

    async fn generate_page(&self, query: &ValidatedQuery) -> Result<SearchOutcome, SearchError> {
        self.recorder.record(None, &query.raw, ACTION_SEARCH).await;

        enter(Stage::Aggregating);
        let sources = self.aggregate(&query.normalized).await?;

        enter(Stage::Generating);
        let html = self.generate(&query.normalized, &sources).await?;

        enter(Stage::Extracting);
        let metadata = extract_metadata(&query.normalized, &html, &sources);

        enter(Stage::Persisting);
        let new_page = NewPage {
            search_query: query.normalized.clone(),
            title: metadata.title.clone(),
            description: metadata.description,
            html_content: html,
            thumbnail_url: metadata.thumbnail_url,
        };
        let page = self
            .store
            .create_page_with_results(&new_page, &sources)
            .await
            .map_err(|e| {
                warn!(error = %e, "page insert failed");
                SearchError::PersistenceFailed(MSG_PAGE_SAVE_FAILED.to_string())
            })?;

        if !page.created {
            // Another writer stored this query first; its page and results stand.
            debug!(page_id = page.id, "page already existed, answering with it");
            return match self.store.find_exact(&query.normalized).await? {
                Some(existing) => Ok(SearchOutcome::Existing(existing)),
                None => Err(
                    anyhow::anyhow!("page {} vanished after create-or-get", page.id).into(),
                ),
            };
        }

        enter(Stage::CachingBestEffort);
        self.cache_page(page.id, &query.normalized).await;

        Ok(SearchOutcome::Created(CreatedPage {
            page_id: page.id,
            title: metadata.title,
            sources_count: sources.len(),
        }))
    }

    async fn aggregate(&self, normalized_query: &str) -> Result<Vec<SourceRecord>, SearchError> {
        let failed = || SearchError::AggregationFailed(MSG_AGGREGATION_FAILED.to_string());

        let sources = match tokio::time::timeout(
            self.settings.aggregation_timeout,
            self.aggregator.aggregate(normalized_query, AGGREGATION_OFFSET),
        )
        .await
        {
            Err(_) => {
                warn!(timeout = ?self.settings.aggregation_timeout, "aggregation timed out");
                return Err(failed());
            }
            Ok(Err(e)) => {
                warn!(error = %e, "aggregation failed");
                return Err(failed());
            }
            Ok(Ok(sources)) => sources,
        };

        if sources.is_empty() {
            warn!("aggregation returned no sources");
            return Err(failed());
        }
        debug!(count = sources.len(), "aggregated sources");
        Ok(sources)
    }

    async fn generate(
        &self,
        normalized_query: &str,
        sources: &[SourceRecord],
    ) -> Result<String, SearchError> {
        let failed = || SearchError::GenerationFailed(MSG_GENERATION_FAILED.to_string());

        let html = match tokio::time::timeout(
            self.settings.generation_timeout,
            self.generator.generate(normalized_query, sources),
        )
        .await
        {
            Err(_) => {
                warn!(timeout = ?self.settings.generation_timeout, "generation timed out");
                return Err(failed());
            }
            Ok(Err(e)) => {
                warn!(model = self.generator.model_name(), error = %e, "generation failed");
                return Err(failed());
            }
            Ok(Ok(html)) => html,
        };

        if html.trim().is_empty() {
            warn!(model = self.generator.model_name(), "generation returned empty markup");
            return Err(failed());
        }
        Ok(html)
    }

    async fn cache_page(&self, page_id: i64, normalized_query: &str) {
        let entry = CacheEntry {
            page_id,
            query: normalized_query.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self
            .cache
            .put(&cache_key(normalized_query), entry, self.settings.cache_ttl)
            .await
        {
            warn!(page_id, error = %e, "cache write failed");
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::PageStatus;
    use crate::store::InMemoryStore;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedAggregator(Vec<SourceRecord>);

    #[async_trait]
    impl ContentAggregator for FixedAggregator {
        async fn aggregate(&self, _q: &str, _offset: usize) -> Result<Vec<SourceRecord>> {
            Ok(self.0.clone())
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl PageGenerator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, q: &str, _s: &[SourceRecord]) -> Result<String> {
            Ok(format!("<h1>{}</h1><p>About {}.</p>", q, q))
        }
    }

    fn source(title: &str) -> SourceRecord {
        SourceRecord {
            source: "web".into(),
            title: title.into(),
            url: None,
            snippet: String::new(),
            image_url: None,
        }
    }

    fn orchestrator(store: Arc<InMemoryStore>) -> SearchOrchestrator {
        SearchOrchestrator::new(
            store,
            Arc::new(FixedAggregator(vec![source("a"), source("b")])),
            Arc::new(EchoGenerator),
            Arc::new(MemoryCache::new()),
            OrchestratorSettings::default(),
        )
    }

    #[test]
    fn test_only_cache_stage_is_best_effort() {
        assert!(Stage::CachingBestEffort.is_best_effort());
        assert!(!Stage::Persisting.is_best_effort());
        assert!(!Stage::Aggregating.is_best_effort());
    }

    #[tokio::test]
    async fn test_invalid_query_touches_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let orch = orchestrator(store.clone());
        assert!(matches!(
            orch.search("x").await,
            Err(SearchError::InvalidInput(_))
        ));
        assert!(store.activity().is_empty());
        assert_eq!(store.page_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_then_exact_hit() {
        let store = Arc::new(InMemoryStore::new());
        let orch = orchestrator(store.clone());

        let first = orch.search("Rust Traits").await.unwrap();
        let SearchOutcome::Created(created) = &first else {
            panic!("expected Created, got {:?}", first);
        };
        assert_eq!(created.title, "Rust traits");
        assert_eq!(created.sources_count, 2);

        let second = orch.search("rust   traits").await.unwrap();
        assert!(matches!(second, SearchOutcome::Existing(_)));
        assert_eq!(second.page_id(), created.page_id);
        assert_eq!(store.page_count(), 1);
        assert_eq!(orch.in_flight_len(), 0);
    }

    struct StalledAggregator;

    #[async_trait]
    impl ContentAggregator for StalledAggregator {
        async fn aggregate(&self, _q: &str, _offset: usize) -> Result<Vec<SourceRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![source("late")])
        }
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_query_lock() {
        let store = Arc::new(InMemoryStore::new());
        let orch = SearchOrchestrator::new(
            store.clone(),
            Arc::new(StalledAggregator),
            Arc::new(EchoGenerator),
            Arc::new(MemoryCache::new()),
            OrchestratorSettings::default(),
        );

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), orch.search("slow topic")).await;
        assert!(abandoned.is_err());
        assert_eq!(orch.in_flight_len(), 0);
        assert_eq!(store.page_count(), 0);
    }

    #[tokio::test]
    async fn test_similar_hit_records_mapping() {
        let store = Arc::new(InMemoryStore::new());
        let id = store.insert_page("laptop", PageStatus::Active, 1);
        let orch = orchestrator(store.clone());

        let outcome = orch.search("best laptop for gaming").await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Similar(_)));
        assert_eq!(outcome.page_id(), id);
        assert_eq!(store.similar_mappings().len(), 1);
        assert_eq!(store.similar_mappings()[0].similarity_score, 0.85);
    }
}
