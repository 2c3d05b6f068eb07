use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connects, applies the schema and closes the pool. Used by `pagesmith init`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation against an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            search_query TEXT NOT NULL COLLATE NOCASE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            html_content TEXT NOT NULL,
            thumbnail_url TEXT,
            relevance_score REAL NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0,
            last_scan_date INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(search_query)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT,
            snippet TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            position_index INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS similar_pages (
            page_id INTEGER NOT NULL,
            similar_page_id INTEGER NOT NULL,
            similarity_score REAL NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (page_id, similar_page_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_activity (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id INTEGER,
            search_query TEXT NOT NULL,
            action_type TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_results_page ON search_results(page_id, position_index)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pages_status_views ON pages(status, view_count DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_activity_page ON user_activity(page_id)")
        .execute(pool)
        .await?;

    Ok(())
}
