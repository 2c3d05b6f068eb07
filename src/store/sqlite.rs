//! SQLite-backed [`PageStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{NewPage, Page, PageMatch, PageRef, PageStatus, SourceRecord, StoredResult};

use super::PageStore;

/// Wraps a [`SqlitePool`] and maps every `PageStore` call onto the schema
/// created by [`crate::migrate::apply_schema`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const INSERT_PAGE: &str = r#"
    INSERT INTO pages (search_query, title, description, html_content, thumbnail_url,
                       last_scan_date, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)
    ON CONFLICT(search_query) DO NOTHING
"#;

const SELECT_PAGE_ID: &str = "SELECT id FROM pages WHERE search_query = ? LIMIT 1";

const INSERT_RESULT: &str = r#"
    INSERT INTO search_results (page_id, source, title, url, snippet, image_url,
                                position_index, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

fn page_match_from_row(row: &SqliteRow) -> PageMatch {
    PageMatch {
        id: row.get("id"),
        search_query: row.get("search_query"),
        relevance_score: row.get("relevance_score"),
        view_count: row.get("view_count"),
        last_scan_date: row.get("last_scan_date"),
    }
}

#[async_trait]
impl PageStore for SqliteStore {
    async fn find_exact(&self, normalized_query: &str) -> Result<Option<PageMatch>> {
        let row = sqlx::query(
            r#"
            SELECT id, search_query, relevance_score, view_count, last_scan_date
            FROM pages
            WHERE LOWER(search_query) = LOWER(?)
            LIMIT 1
            "#,
        )
        .bind(normalized_query)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(page_match_from_row))
    }

    async fn find_similar(&self, normalized_query: &str, limit: i64) -> Result<Vec<PageMatch>> {
        // instr() keeps `%` and `_` in user input literal, unlike LIKE.
        let rows = sqlx::query(
            r#"
            SELECT id, search_query, relevance_score, view_count, last_scan_date
            FROM pages
            WHERE status = 'active'
              AND (
                instr(LOWER(search_query), LOWER(?1)) > 0
                OR instr(LOWER(?1), LOWER(search_query)) > 0
              )
            ORDER BY view_count DESC, id ASC
            LIMIT ?2
            "#,
        )
        .bind(normalized_query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(page_match_from_row).collect())
    }

    async fn create_or_get_page(&self, page: &NewPage) -> Result<PageRef> {
        let now = chrono::Utc::now().timestamp();

        let inserted = sqlx::query(INSERT_PAGE)
            .bind(&page.search_query)
            .bind(&page.title)
            .bind(&page.description)
            .bind(&page.html_content)
            .bind(&page.thumbnail_url)
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let id: i64 = sqlx::query_scalar(SELECT_PAGE_ID)
            .bind(&page.search_query)
            .fetch_optional(&self.pool)
            .await?
            .with_context(|| format!("page row missing after insert: {}", page.search_query))?;

        Ok(PageRef {
            id,
            created: inserted == 1,
        })
    }

    async fn create_page_with_results(
        &self,
        page: &NewPage,
        results: &[SourceRecord],
    ) -> Result<PageRef> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(INSERT_PAGE)
            .bind(&page.search_query)
            .bind(&page.title)
            .bind(&page.description)
            .bind(&page.html_content)
            .bind(&page.thumbnail_url)
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let id: i64 = sqlx::query_scalar(SELECT_PAGE_ID)
            .bind(&page.search_query)
            .fetch_optional(&mut *tx)
            .await?
            .with_context(|| format!("page row missing after insert: {}", page.search_query))?;

        let created = inserted == 1;
        if created {
            for (position, record) in results.iter().enumerate() {
                sqlx::query(INSERT_RESULT)
                    .bind(id)
                    .bind(&record.source)
                    .bind(&record.title)
                    .bind(&record.url)
                    .bind(&record.snippet)
                    .bind(&record.image_url)
                    .bind(position as i64)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(PageRef { id, created })
    }

    async fn add_search_result(
        &self,
        page_id: i64,
        position_index: i64,
        record: &SourceRecord,
    ) -> Result<()> {
        sqlx::query(INSERT_RESULT)
            .bind(page_id)
            .bind(&record.source)
            .bind(&record.title)
            .bind(&record.url)
            .bind(&record.snippet)
            .bind(&record.image_url)
            .bind(position_index)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_activity(
        &self,
        page_id: Option<i64>,
        raw_query: &str,
        action_type: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_activity (page_id, search_query, action_type, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(page_id)
        .bind(raw_query)
        .bind(action_type)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_view_count(&self, page_id: i64) -> Result<()> {
        sqlx::query("UPDATE pages SET view_count = view_count + 1 WHERE id = ?")
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_similar_mapping(
        &self,
        page_id: i64,
        similar_page_id: i64,
        similarity_score: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO similar_pages (page_id, similar_page_id, similarity_score, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(page_id)
        .bind(similar_page_id)
        .bind(similarity_score)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let row = sqlx::query(
            r#"
            SELECT id, search_query, title, description, html_content, thumbnail_url,
                   relevance_score, view_count, last_scan_date, status, created_at, updated_at
            FROM pages
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status: String = r.get("status");
            Page {
                id: r.get("id"),
                search_query: r.get("search_query"),
                title: r.get("title"),
                description: r.get("description"),
                html_content: r.get("html_content"),
                thumbnail_url: r.get("thumbnail_url"),
                relevance_score: r.get("relevance_score"),
                view_count: r.get("view_count"),
                last_scan_date: r.get("last_scan_date"),
                status: PageStatus::parse(&status),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            }
        }))
    }

    async fn list_results(&self, page_id: i64) -> Result<Vec<StoredResult>> {
        let rows = sqlx::query(
            r#"
            SELECT page_id, source, title, url, snippet, image_url, position_index
            FROM search_results
            WHERE page_id = ?
            ORDER BY position_index ASC
            "#,
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| StoredResult {
                page_id: r.get("page_id"),
                position_index: r.get("position_index"),
                record: SourceRecord {
                    source: r.get("source"),
                    title: r.get("title"),
                    url: r.get("url"),
                    snippet: r.get("snippet"),
                    image_url: r.get("image_url"),
                },
            })
            .collect())
    }
}
