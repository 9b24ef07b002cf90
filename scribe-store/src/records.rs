//! Telemetry record types
//!
//! The three entities this layer persists. Payload fields (`properties`,
//! `body`) are opaque semi-structured documents carried as
//! `serde_json::Value` and stored verbatim as jsonb; no schema is inferred
//! for them. Identifiers are caller-supplied.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An inbound API request as observed by the logging edge.
///
/// Insert-only: written once when the call is logged, never updated or
/// deleted by this layer.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RequestRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub url_href: String,
    pub user_id: String,
    /// Arbitrary caller-attached key/value properties.
    pub properties: Value,
    pub org_id: Uuid,
    /// Upstream provider the request was routed to.
    pub provider: String,
    pub model: String,
    /// Request payload, stored verbatim.
    pub body: Value,
    pub request_received_at: DateTime<Utc>,
}

/// The response to a logged request.
///
/// The one mutable entity: inserted as soon as the response is first
/// observed (possibly incomplete), then overwritten in place once final
/// token counts and timing are known.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ResponseRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Response payload, stored verbatim.
    pub body: Value,
    /// The request this response belongs to.
    #[sqlx(rename = "request")]
    pub request_id: Uuid,
    pub delay_ms: i64,
    pub http_status: i32,
    pub completion_tokens: Option<i64>,
    pub model: String,
    pub prompt_tokens: Option<i64>,
    /// Unset until the response completes.
    pub response_received_at: Option<DateTime<Utc>>,
    pub org_id: Uuid,
    pub prompt_cache_write_tokens: Option<i64>,
    pub prompt_cache_read_tokens: Option<i64>,
}

/// User feedback on a response. At most one row per response; a second
/// submission replaces rating and timestamp.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FeedbackRecord {
    pub response_id: Uuid,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}
