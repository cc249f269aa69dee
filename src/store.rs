use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::data_model::PersistedRecord;
use crate::error::Result;

/// Storage sink for scored links, keyed by `(keyword, source_url,
/// href_url)`. `upsert` has replace semantics: an existing record under the
/// same key is deleted before the new one is inserted, so concurrent stage
/// runs converge on last-write-wins.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn upsert(&self, record: &PersistedRecord) -> Result<()>;

    /// Records matching the optional filters, highest score first.
    async fn find(
        &self,
        keyword: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<Vec<PersistedRecord>>;

    async fn find_by_href(&self, href_url: &str) -> Result<Option<PersistedRecord>>;

    /// Cheap liveness probe, used by health endpoints.
    async fn ping(&self) -> Result<()>;
}

/// PostgreSQL-backed store with a bounded, health-checked connection pool.
/// The pool is constructed once at stage startup and injected; its lifetime
/// is the stage process lifetime.
pub struct PgLinkStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct LinkRow {
    keyword: String,
    source_url: String,
    href_url: String,
    score: f64,
    raw_payload: serde_json::Value,
}

impl From<LinkRow> for PersistedRecord {
    fn from(row: LinkRow) -> Self {
        PersistedRecord {
            keyword: row.keyword,
            source_url: row.source_url,
            href_url: row.href_url,
            score: row.score,
            raw_payload: row.raw_payload,
        }
    }
}

impl PgLinkStore {
    /// Connect and bootstrap the schema. A connection failure here is fatal
    /// to the caller; there is no degraded mode.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to Postgres");
        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool, e.g. one shared with an embedding server.
    pub fn from_pool(pool: PgPool) -> Self {
        PgLinkStore { pool }
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scraped_links (
                id BIGSERIAL PRIMARY KEY,
                keyword TEXT NOT NULL,
                source_url TEXT NOT NULL,
                href_url TEXT NOT NULL,
                score DOUBLE PRECISION NOT NULL DEFAULT 0.0,
                raw_payload JSONB,
                processed_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scraped_links_natural_key \
             ON scraped_links (keyword, source_url, href_url)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn upsert(&self, record: &PersistedRecord) -> Result<()> {
        // Replace, not merge: delete-then-insert inside one transaction.
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM scraped_links WHERE keyword = $1 AND source_url = $2 AND href_url = $3",
        )
        .bind(&record.keyword)
        .bind(&record.source_url)
        .bind(&record.href_url)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO scraped_links (keyword, source_url, href_url, score, raw_payload) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.keyword)
        .bind(&record.source_url)
        .bind(&record.href_url)
        .bind(record.score)
        .bind(&record.raw_payload)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(
            keyword = %record.keyword,
            href_url = %record.href_url,
            score = record.score,
            "Upserted link record"
        );
        Ok(())
    }

    async fn find(
        &self,
        keyword: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<Vec<PersistedRecord>> {
        let rows: Vec<LinkRow> = sqlx::query_as(
            "SELECT keyword, source_url, href_url, score, raw_payload FROM scraped_links \
             WHERE ($1::text IS NULL OR keyword = $1) \
               AND ($2::text IS NULL OR source_url = $2) \
             ORDER BY score DESC",
        )
        .bind(keyword)
        .bind(source_url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PersistedRecord::from).collect())
    }

    async fn find_by_href(&self, href_url: &str) -> Result<Option<PersistedRecord>> {
        let row: Option<LinkRow> = sqlx::query_as(
            "SELECT keyword, source_url, href_url, score, raw_payload FROM scraped_links \
             WHERE href_url = $1 LIMIT 1",
        )
        .bind(href_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PersistedRecord::from))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-process store for tests and embedded runs. Same replace-by-key
/// contract as [`PgLinkStore`].
#[derive(Default)]
pub struct MemoryLinkStore {
    records: Mutex<HashMap<(String, String, String), PersistedRecord>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn upsert(&self, record: &PersistedRecord) -> Result<()> {
        let key = (
            record.keyword.clone(),
            record.source_url.clone(),
            record.href_url.clone(),
        );
        self.records.lock().await.insert(key, record.clone());
        Ok(())
    }

    async fn find(
        &self,
        keyword: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<Vec<PersistedRecord>> {
        let records = self.records.lock().await;
        let mut matches: Vec<PersistedRecord> = records
            .values()
            .filter(|r| keyword.map_or(true, |k| r.keyword == k))
            .filter(|r| source_url.map_or(true, |s| r.source_url == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }

    async fn find_by_href(&self, href_url: &str) -> Result<Option<PersistedRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .find(|r| r.href_url == href_url)
            .cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
