//! Page retrieval by ID.
//!
//! Fetches a page and its ordered search results. Used by both the
//! `pagesmith get` CLI command and `GET /api/pages/{id}`.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{PageStatus, StoredResult};
use crate::store::{PageStore, SqliteStore};

#[derive(Debug, Clone, Serialize)]
pub struct PageResponse {
    pub id: i64,
    pub search_query: String,
    pub title: String,
    pub description: String,
    pub html_content: String,
    pub thumbnail_url: Option<String>,
    pub relevance_score: f64,
    pub view_count: i64,
    pub status: PageStatus,
    pub last_scan_date: String, // ISO8601
    pub created_at: String,     // ISO8601
    pub updated_at: String,     // ISO8601
    pub results: Vec<StoredResult>,
}

/// Page plus results, or `None` if there is no page with this id.
pub async fn get_page(store: &dyn PageStore, id: i64) -> Result<Option<PageResponse>> {
    let Some(page) = store.get_page(id).await? else {
        return Ok(None);
    };
    let results = store.list_results(id).await?;

    Ok(Some(PageResponse {
        id: page.id,
        search_query: page.search_query,
        title: page.title,
        description: page.description,
        html_content: page.html_content,
        thumbnail_url: page.thumbnail_url,
        relevance_score: page.relevance_score,
        view_count: page.view_count,
        status: page.status,
        last_scan_date: format_ts_iso(page.last_scan_date),
        created_at: format_ts_iso(page.created_at),
        updated_at: format_ts_iso(page.updated_at),
        results,
    }))
}

/// CLI entry point — loads the page and prints it to stdout.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let page = get_page(&store, id).await;
    pool.close().await;

    let page = match page? {
        Some(p) => p,
        None => bail!("page not found: {}", id),
    };

    println!("--- Page ---");
    println!("id:           {}", page.id);
    println!("query:        {}", page.search_query);
    println!("title:        {}", page.title);
    println!("description:  {}", page.description);
    if let Some(ref thumb) = page.thumbnail_url {
        println!("thumbnail:    {}", thumb);
    }
    println!("status:       {}", page.status.as_str());
    println!("views:        {}", page.view_count);
    println!("relevance:    {}", page.relevance_score);
    println!("last_scan:    {}", page.last_scan_date);
    println!("created_at:   {}", page.created_at);
    println!();

    println!("--- Results ({}) ---", page.results.len());
    for result in &page.results {
        println!(
            "[{}] {} ({})",
            result.position_index, result.record.title, result.record.source
        );
        if let Some(ref url) = result.record.url {
            println!("    {}", url);
        }
    }
    println!();

    println!("--- HTML ---");
    println!("{}", page.html_content);

    Ok(())
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
