//! Telemetry store - the write API and its fallible query executor
//!
//! `TelemetryStore` is a cheap-to-clone handle over the connection pool.
//! Construct it once at process start and thread it through callers; pool
//! sizing is a process-wide budget, so there must be exactly one per
//! process.
//!
//! Every statement funnels through [`TelemetryStore::execute`]: acquire a
//! connection, run, release on every exit path. The release is the RAII
//! drop of the pooled connection guard, so a failing statement can never
//! leak its connection.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgQueryResult};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

use crate::config::StoreConfig;
use crate::error::{ConfigError, QueryError};
use crate::pool::build_pool;
use crate::records::{FeedbackRecord, RequestRecord, ResponseRecord};

const INSERT_REQUEST_SQL: &str = r#"
    INSERT INTO request (
        id,
        created_at,
        url_href,
        user_id,
        properties,
        org_id,
        provider,
        body,
        request_received_at,
        model
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

const INSERT_RESPONSE_SQL: &str = r#"
    INSERT INTO response (
        id,
        created_at,
        body,
        request,
        delay_ms,
        http_status,
        completion_tokens,
        model,
        prompt_tokens,
        response_received_at,
        org_id,
        prompt_cache_write_tokens,
        prompt_cache_read_tokens
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

const UPDATE_RESPONSE_SQL: &str = r#"
    UPDATE response
    SET
        body = $1,
        delay_ms = $2,
        http_status = $3,
        completion_tokens = $4,
        model = $5,
        prompt_tokens = $6,
        response_received_at = $7,
        prompt_cache_write_tokens = $8,
        prompt_cache_read_tokens = $9
    WHERE id = $10
"#;

const UPSERT_FEEDBACK_SQL: &str = r#"
    INSERT INTO feedback (
        response_id,
        rating,
        created_at
    )
    VALUES ($1, $2, $3)
    ON CONFLICT (response_id) DO UPDATE SET
        rating = EXCLUDED.rating,
        created_at = EXCLUDED.created_at
"#;

/// Handle to the telemetry write path.
///
/// Clones share one pool. The handle is a write-through path: rows are
/// owned by the store the moment a call returns.
#[derive(Clone)]
pub struct TelemetryStore {
    pool: PgPool,
}

impl TelemetryStore {
    /// Build the store from validated configuration.
    ///
    /// The pool is lazy; this performs no network I/O. An unreachable
    /// store surfaces as [`QueryError::Acquisition`] on first use.
    pub fn connect(config: &StoreConfig) -> Self {
        Self {
            pool: build_pool(config),
        }
    }

    /// Build the store from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if required settings are absent or invalid;
    /// callers treat this as fatal at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::connect(&StoreConfig::from_env()?))
    }

    /// The underlying pool, for direct reads in tests and tooling.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run one statement through the pool.
    ///
    /// Acquisition failure returns [`QueryError::Acquisition`] without
    /// attempting the statement. The connection guard is dropped on every
    /// path out of this function, so the connection is always released.
    pub(crate) async fn execute(
        &self,
        statement: &'static str,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<PgQueryResult, QueryError> {
        let mut conn = self.pool.acquire().await.map_err(|source| {
            tracing::error!(statement, error = %source, "connection acquisition failed");
            QueryError::acquisition(source)
        })?;

        query.execute(&mut *conn).await.map_err(|source| {
            tracing::error!(statement, error = %source, "statement failed");
            QueryError::execution(statement, source)
        })
    }

    /// Liveness probe: round-trip the store's clock.
    pub async fn now(&self) -> Result<DateTime<Utc>, QueryError> {
        let mut conn = self.pool.acquire().await.map_err(|source| {
            tracing::error!(statement = "now", error = %source, "connection acquisition failed");
            QueryError::acquisition(source)
        })?;

        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
            .fetch_one(&mut *conn)
            .await
            .map_err(|source| QueryError::execution("now", source))
    }

    /// Insert a request row.
    ///
    /// All ten fields are bound positionally; payload fields go in as
    /// jsonb. A duplicate id fails the primary-key constraint and comes
    /// back as [`QueryError::Execution`].
    pub async fn insert_request(&self, request: &RequestRecord) -> Result<(), QueryError> {
        tracing::debug!(request_id = %request.id, "inserting request");
        let query = sqlx::query(INSERT_REQUEST_SQL)
            .bind(request.id)
            .bind(request.created_at)
            .bind(&request.url_href)
            .bind(&request.user_id)
            .bind(&request.properties)
            .bind(request.org_id)
            .bind(&request.provider)
            .bind(&request.body)
            .bind(request.request_received_at)
            .bind(&request.model);
        self.execute("insert_request", query).await?;
        Ok(())
    }

    /// Insert a response row as first observed.
    ///
    /// Unset optional fields (reception timestamp, token counts) are bound
    /// as SQL NULL. The referenced request must already exist.
    pub async fn insert_response(&self, response: &ResponseRecord) -> Result<(), QueryError> {
        let query = sqlx::query(INSERT_RESPONSE_SQL)
            .bind(response.id)
            .bind(response.created_at)
            .bind(&response.body)
            .bind(response.request_id)
            .bind(response.delay_ms)
            .bind(response.http_status)
            .bind(response.completion_tokens)
            .bind(&response.model)
            .bind(response.prompt_tokens)
            .bind(response.response_received_at)
            .bind(response.org_id)
            .bind(response.prompt_cache_write_tokens)
            .bind(response.prompt_cache_read_tokens);
        self.execute("insert_response", query).await?;
        Ok(())
    }

    /// Overwrite a response row once final timing and token counts are
    /// known.
    ///
    /// Keyed by id; the request relation is left untouched. An unknown id
    /// affects zero rows and still returns `Ok` - callers cannot
    /// distinguish "updated" from "no-op", and must not rely on row-count
    /// feedback.
    pub async fn update_response(&self, response: &ResponseRecord) -> Result<(), QueryError> {
        let query = sqlx::query(UPDATE_RESPONSE_SQL)
            .bind(&response.body)
            .bind(response.delay_ms)
            .bind(response.http_status)
            .bind(response.completion_tokens)
            .bind(&response.model)
            .bind(response.prompt_tokens)
            .bind(response.response_received_at)
            .bind(response.prompt_cache_write_tokens)
            .bind(response.prompt_cache_read_tokens)
            .bind(response.id);
        self.execute("update_response", query).await?;
        Ok(())
    }

    /// Insert or replace feedback for a response.
    ///
    /// One row per response: a second submission overwrites rating and
    /// timestamp in a single atomic statement. Concurrent upserts for the
    /// same response race; the last commit wins.
    pub async fn upsert_feedback(&self, feedback: &FeedbackRecord) -> Result<(), QueryError> {
        let query = sqlx::query(UPSERT_FEEDBACK_SQL)
            .bind(feedback.response_id)
            .bind(feedback.rating)
            .bind(feedback.created_at);
        self.execute("upsert_feedback", query).await?;
        Ok(())
    }

    /// Drain and close all connections. Idempotent; call once at process
    /// teardown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
