// src/store/postgres.rs
//! Postgres `ResponseStore` (sqlx). Each call acquires one pooled connection and
//! returns it when the call ends; mention inserts run in a short transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use std::time::Duration as StdDuration;

use super::{
    window_start, AiResponse, AlertLogEntry, KeywordMatch, KeywordMatches, MentionCount,
    NewResponse, ResponseStore, SourceSentimentCount, StoreError,
};
use crate::analyze::{Mention, Sentiment};

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable {
                message: e.to_string(),
            },
            other => StoreError::Query {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Lazily connecting pool: an unreachable database surfaces per call, not here.
    pub fn connect_lazy(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(StdDuration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes (embedded migrations).
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query {
                message: format!("migration failed: {e}"),
            })
    }
}

fn to_u64(v: i64) -> u64 {
    v.max(0) as u64
}

fn parse_sentiment(raw: Option<String>) -> Option<Sentiment> {
    raw.and_then(|s| s.parse().ok())
}

#[async_trait]
impl ResponseStore for PgStore {
    async fn insert_response(&self, new: NewResponse) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let id: i64 = sqlx::query(
            r#"
            INSERT INTO ai_responses (ai_name, query_text, response_text, timestamp)
            VALUES ($1, $2, $3, COALESCE($4, CURRENT_TIMESTAMP))
            RETURNING id
            "#,
        )
        .bind(&new.ai_name)
        .bind(&new.query_text)
        .bind(&new.response_text)
        .bind(new.timestamp)
        .fetch_one(&mut *conn)
        .await?
        .try_get("id")?;
        Ok(id)
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<AiResponse>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, ai_name, query_text, response_text, response_links, timestamp
            FROM ai_responses
            WHERE response_sentiment IS NULL
            ORDER BY timestamp DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let links: Option<Vec<String>> = row.try_get("response_links")?;
            out.push(AiResponse {
                id: row.try_get("id")?,
                ai_name: row.try_get("ai_name")?,
                query_text: row.try_get("query_text")?,
                response_text: row.try_get("response_text")?,
                sentiment: None,
                links: links.unwrap_or_default(),
                timestamp: row.try_get("timestamp")?,
            });
        }
        Ok(out)
    }

    async fn update_response_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        let res = sqlx::query(
            r#"
            UPDATE ai_responses
            SET response_sentiment = $1, response_links = $2
            WHERE id = $3
            "#,
        )
        .bind(sentiment.as_str())
        .bind(links)
        .bind(response_id)
        .execute(&mut *conn)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: response_id });
        }
        Ok(())
    }

    async fn insert_mentions(&self, response_id: i64, mentions: &[Mention]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT response_sentiment FROM ai_responses WHERE id = $1")
            .bind(response_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound { id: response_id })?;
        let sentiment: Option<String> = row.try_get("response_sentiment")?;
        if parse_sentiment(sentiment).is_none() {
            return Err(StoreError::Invariant {
                message: format!("response {response_id} has no sentiment; mentions rejected"),
            });
        }

        for m in mentions {
            sqlx::query(
                r#"
                INSERT INTO brand_mentions
                (ai_response_id, brand_name, mention_type, sentiment, context)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(response_id)
            .bind(&m.brand_name)
            .bind(m.mention_type.as_str())
            .bind(m.sentiment.as_str())
            .bind(&m.context)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn persist_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
        mentions: &[Mention],
    ) -> Result<(), StoreError> {
        // Dropping `tx` on any early return rolls the whole write back.
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE ai_responses
            SET response_sentiment = $1, response_links = $2
            WHERE id = $3
            "#,
        )
        .bind(sentiment.as_str())
        .bind(links)
        .bind(response_id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: response_id });
        }

        for m in mentions {
            sqlx::query(
                r#"
                INSERT INTO brand_mentions
                (ai_response_id, brand_name, mention_type, sentiment, context)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(response_id)
            .bind(&m.brand_name)
            .bind(m.mention_type.as_str())
            .bind(m.sentiment.as_str())
            .bind(&m.context)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn windowed_sentiment_counts(
        &self,
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<SourceSentimentCount>, StoreError> {
        let since: DateTime<Utc> = window_start(window);
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT
                ai_name,
                COUNT(*) AS total_count,
                COUNT(*) FILTER (WHERE response_sentiment = 'negative') AS negative_count
            FROM ai_responses
            WHERE timestamp >= $2
            AND ai_name = ANY($1)
            GROUP BY ai_name
            ORDER BY array_position($1::text[], ai_name::text)
            "#,
        )
        .bind(ai_sources)
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(SourceSentimentCount {
                ai_name: row.try_get("ai_name")?,
                total: to_u64(row.try_get("total_count")?),
                negative: to_u64(row.try_get("negative_count")?),
            });
        }
        Ok(out)
    }

    async fn windowed_mention_counts(
        &self,
        brands: &[String],
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<MentionCount>, StoreError> {
        let mut keys: Vec<String> = Vec::with_capacity(brands.len());
        for b in brands {
            let k = b.to_lowercase();
            if !keys.contains(&k) {
                keys.push(k);
            }
        }
        let since = window_start(window);

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT
                lower(bm.brand_name) AS brand_key,
                ar.ai_name,
                COUNT(*) AS mention_count
            FROM brand_mentions bm
            JOIN ai_responses ar ON bm.ai_response_id = ar.id
            WHERE ar.timestamp >= $3
            AND lower(bm.brand_name) = ANY($1)
            AND ar.ai_name = ANY($2)
            GROUP BY lower(bm.brand_name), ar.ai_name
            ORDER BY array_position($1::text[], lower(bm.brand_name)::text),
                     array_position($2::text[], ar.ai_name::text)
            "#,
        )
        .bind(&keys)
        .bind(ai_sources)
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("brand_key")?;
            let brand_name = brands
                .iter()
                .find(|b| b.to_lowercase() == key)
                .cloned()
                .unwrap_or(key);
            out.push(MentionCount {
                brand_name,
                ai_name: row.try_get("ai_name")?,
                count: to_u64(row.try_get("mention_count")?),
            });
        }
        Ok(out)
    }

    async fn windowed_keyword_matches(
        &self,
        ai_sources: &[String],
        pattern: &str,
        window: Duration,
        limit: usize,
    ) -> Result<KeywordMatches, StoreError> {
        let since = window_start(window);
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_count
            FROM ai_responses ar
            WHERE ar.timestamp >= $2
            AND ar.ai_name = ANY($1)
            AND (ar.response_text ~* $3 OR ar.query_text ~* $3)
            "#,
        )
        .bind(ai_sources)
        .bind(since)
        .bind(pattern)
        .fetch_one(&mut *conn)
        .await?
        .try_get("total_count")?;

        let rows = sqlx::query(
            r#"
            SELECT ar.ai_name, ar.query_text, ar.response_text, ar.timestamp
            FROM ai_responses ar
            WHERE ar.timestamp >= $2
            AND ar.ai_name = ANY($1)
            AND (ar.response_text ~* $3 OR ar.query_text ~* $3)
            ORDER BY ar.timestamp DESC, ar.id DESC
            LIMIT $4
            "#,
        )
        .bind(ai_sources)
        .bind(since)
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;

        let mut recent = Vec::with_capacity(rows.len());
        for row in rows {
            recent.push(KeywordMatch {
                ai_name: row.try_get("ai_name")?,
                query_text: row.try_get("query_text")?,
                response_text: row.try_get("response_text")?,
                timestamp: row.try_get("timestamp")?,
            });
        }

        Ok(KeywordMatches {
            total: to_u64(total),
            recent,
        })
    }

    async fn append_alert_log(&self, entry: &AlertLogEntry) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO alert_logs (rule_name, message, severity, data, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.rule_name)
        .bind(&entry.message)
        .bind(entry.severity.as_str())
        .bind(Json(&entry.data))
        .bind(entry.timestamp)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
