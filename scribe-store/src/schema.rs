//! Schema bootstrap for the three telemetry tables
//!
//! Idempotent DDL, safe to run at every startup and before integration
//! tests. Referential integrity and the non-negativity of counters live
//! here, in the store, not in the client.

use crate::error::QueryError;
use crate::store::TelemetryStore;

/// Create the telemetry tables and indexes if they do not exist.
pub async fn ensure(store: &TelemetryStore) -> Result<(), QueryError> {
    tracing::info!("ensuring telemetry schema");

    store
        .execute(
            "create_request_table",
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS request (
                    id UUID PRIMARY KEY,
                    created_at TIMESTAMPTZ NOT NULL,
                    url_href TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    properties JSONB NOT NULL,
                    org_id UUID NOT NULL,
                    provider TEXT NOT NULL,
                    body JSONB NOT NULL,
                    request_received_at TIMESTAMPTZ NOT NULL,
                    model TEXT NOT NULL
                )
                "#,
            ),
        )
        .await?;

    store
        .execute(
            "create_response_table",
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS response (
                    id UUID PRIMARY KEY,
                    created_at TIMESTAMPTZ NOT NULL,
                    body JSONB NOT NULL,
                    request UUID NOT NULL REFERENCES request(id),
                    delay_ms BIGINT NOT NULL CHECK (delay_ms >= 0),
                    http_status INT NOT NULL,
                    completion_tokens BIGINT CHECK (completion_tokens >= 0),
                    model TEXT NOT NULL,
                    prompt_tokens BIGINT CHECK (prompt_tokens >= 0),
                    response_received_at TIMESTAMPTZ,
                    org_id UUID NOT NULL,
                    prompt_cache_write_tokens BIGINT CHECK (prompt_cache_write_tokens >= 0),
                    prompt_cache_read_tokens BIGINT CHECK (prompt_cache_read_tokens >= 0)
                )
                "#,
            ),
        )
        .await?;

    store
        .execute(
            "create_feedback_table",
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS feedback (
                    response_id UUID PRIMARY KEY REFERENCES response(id),
                    rating INT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL
                )
                "#,
            ),
        )
        .await?;

    store
        .execute(
            "create_response_request_index",
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_response_request ON response(request)",
            ),
        )
        .await?;

    tracing::info!("telemetry schema ready");
    Ok(())
}
