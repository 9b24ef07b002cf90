//! Integration tests for the telemetry write path.
//!
//! These require a reachable Postgres; run with the SCRIBE_DB_* variables
//! set:
//!
//!   cargo test -p scribe-store -- --ignored

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use scribe_store::{
    schema, FeedbackRecord, QueryError, RequestRecord, ResponseRecord, StoreConfig, TelemetryStore,
};

async fn test_store() -> TelemetryStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("scribe_store=debug")
        .try_init();
    let store = TelemetryStore::from_env().expect("SCRIBE_DB_* required");
    schema::ensure(&store).await.expect("schema bootstrap failed");
    store
}

async fn small_pool_store(max_connections: u32, acquire_ms: u64) -> TelemetryStore {
    let mut config = StoreConfig::from_env().expect("SCRIBE_DB_* required");
    config.max_connections = max_connections;
    config.acquire_timeout = Duration::from_millis(acquire_ms);
    let store = TelemetryStore::connect(&config);
    schema::ensure(&store).await.expect("schema bootstrap failed");
    store
}

/// Whole-second timestamp; timestamptz carries microseconds, so
/// nanosecond-precision `Utc::now()` values would not round-trip exactly.
fn ts(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, hour, min, sec).unwrap()
}

fn sample_request(id: Uuid, org_id: Uuid) -> RequestRecord {
    RequestRecord {
        id,
        created_at: ts(10, 0, 0),
        url_href: "https://api.example.com/v1/chat/completions".into(),
        user_id: "user-42".into(),
        properties: json!({"session": "abc", "tier": "free"}),
        org_id,
        provider: "openai".into(),
        model: "gpt-4".into(),
        body: json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hello"}]
        }),
        request_received_at: ts(10, 0, 1),
    }
}

fn sample_response(id: Uuid, request_id: Uuid, org_id: Uuid) -> ResponseRecord {
    ResponseRecord {
        id,
        created_at: ts(10, 0, 2),
        body: json!({"partial": true}),
        request_id,
        delay_ms: 0,
        http_status: 200,
        completion_tokens: None,
        model: "gpt-4".into(),
        prompt_tokens: None,
        response_received_at: None,
        org_id,
        prompt_cache_write_tokens: None,
        prompt_cache_read_tokens: None,
    }
}

async fn read_request(store: &TelemetryStore, id: Uuid) -> Option<RequestRecord> {
    sqlx::query_as(
        r#"
        SELECT id, created_at, url_href, user_id, properties, org_id,
               provider, model, body, request_received_at
        FROM request WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(store.pool())
    .await
    .expect("request read failed")
}

async fn read_response(store: &TelemetryStore, id: Uuid) -> Option<ResponseRecord> {
    sqlx::query_as(
        r#"
        SELECT id, created_at, body, request, delay_ms, http_status,
               completion_tokens, model, prompt_tokens, response_received_at,
               org_id, prompt_cache_write_tokens, prompt_cache_read_tokens
        FROM response WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(store.pool())
    .await
    .expect("response read failed")
}

async fn read_feedback(store: &TelemetryStore, response_id: Uuid) -> Vec<FeedbackRecord> {
    sqlx::query_as("SELECT response_id, rating, created_at FROM feedback WHERE response_id = $1")
        .bind(response_id)
        .fetch_all(store.pool())
        .await
        .expect("feedback read failed")
}

#[tokio::test]
#[ignore = "requires database"]
async fn request_round_trips() {
    let store = test_store().await;
    let request = sample_request(Uuid::new_v4(), Uuid::new_v4());

    store.insert_request(&request).await.expect("insert failed");

    let stored = read_request(&store, request.id).await.expect("row missing");
    assert_eq!(stored, request);
    // Semi-structured fields come back structurally identical.
    assert_eq!(stored.properties, request.properties);
    assert_eq!(stored.body["messages"][0]["content"], "hello");
}

#[tokio::test]
#[ignore = "requires database"]
async fn response_update_overwrites_in_place() {
    let store = test_store().await;
    let org_id = Uuid::new_v4();
    let request = sample_request(Uuid::new_v4(), org_id);
    store.insert_request(&request).await.expect("insert failed");

    let mut response = sample_response(Uuid::new_v4(), request.id, org_id);
    store
        .insert_response(&response)
        .await
        .expect("insert failed");

    response.body = json!({"choices": [{"finish_reason": "stop"}]});
    response.delay_ms = 1_234;
    response.completion_tokens = Some(42);
    response.prompt_tokens = Some(17);
    response.prompt_cache_read_tokens = Some(8);
    response.response_received_at = Some(ts(10, 0, 5));
    store
        .update_response(&response)
        .await
        .expect("update failed");

    let stored = read_response(&store, response.id).await.expect("row missing");
    assert_eq!(stored, response);
    // The request relation is never part of the update.
    assert_eq!(stored.request_id, request.id);
}

#[tokio::test]
#[ignore = "requires database"]
async fn update_of_unknown_response_is_a_silent_noop() {
    let store = test_store().await;
    let response = sample_response(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // No such row; the contract deliberately hides "zero rows affected".
    store
        .update_response(&response)
        .await
        .expect("no-op update should not error");
    assert!(read_response(&store, response.id).await.is_none());
}

#[tokio::test]
#[ignore = "requires database"]
async fn feedback_upsert_is_idempotent() {
    let store = test_store().await;
    let org_id = Uuid::new_v4();
    let request = sample_request(Uuid::new_v4(), org_id);
    store.insert_request(&request).await.expect("insert failed");
    let response = sample_response(Uuid::new_v4(), request.id, org_id);
    store
        .insert_response(&response)
        .await
        .expect("insert failed");

    let feedback = FeedbackRecord {
        response_id: response.id,
        rating: 1,
        created_at: ts(11, 0, 0),
    };
    store.upsert_feedback(&feedback).await.expect("upsert failed");
    store.upsert_feedback(&feedback).await.expect("upsert failed");

    let rows = read_feedback(&store, response.id).await;
    assert_eq!(rows, vec![feedback]);
}

#[tokio::test]
#[ignore = "requires database"]
async fn feedback_last_write_wins() {
    let store = test_store().await;
    let org_id = Uuid::new_v4();
    let request = sample_request(Uuid::new_v4(), org_id);
    store.insert_request(&request).await.expect("insert failed");
    let response = sample_response(Uuid::new_v4(), request.id, org_id);
    store
        .insert_response(&response)
        .await
        .expect("insert failed");

    store
        .upsert_feedback(&FeedbackRecord {
            response_id: response.id,
            rating: 1,
            created_at: ts(11, 0, 0),
        })
        .await
        .expect("upsert failed");
    store
        .upsert_feedback(&FeedbackRecord {
            response_id: response.id,
            rating: 0,
            created_at: ts(11, 5, 0),
        })
        .await
        .expect("upsert failed");

    let rows = read_feedback(&store, response.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rating, 0);
    assert_eq!(rows[0].created_at, ts(11, 5, 0));
}

#[tokio::test]
#[ignore = "requires database"]
async fn failed_statements_release_their_connections() {
    let store = small_pool_store(3, 1_000).await;
    let request = sample_request(Uuid::new_v4(), Uuid::new_v4());
    store.insert_request(&request).await.expect("insert failed");

    // Re-inserting the same id violates the primary key. Doing so more
    // times than the pool has connections proves no connection leaks on
    // the failure path; a leak would turn these into acquisition errors.
    for _ in 0..12 {
        let err = store
            .insert_request(&request)
            .await
            .expect_err("duplicate id must fail");
        match err {
            QueryError::Execution { statement, .. } => assert_eq!(statement, "insert_request"),
            QueryError::Acquisition { .. } => panic!("connection leaked on failure path"),
        }
    }

    store.now().await.expect("pool should still serve queries");
}

#[tokio::test]
#[ignore = "requires database"]
async fn excess_callers_block_or_fail_acquisition() {
    let store = small_pool_store(2, 300).await;

    let calls = (0..16).map(|_| {
        let store = store.clone();
        async move { store.now().await }
    });
    let results = join_all(calls).await;

    let mut succeeded = 0;
    for result in results {
        match result {
            Ok(_) => succeeded += 1,
            // Contention may time out a caller, but it must surface as an
            // acquisition error, never as a statement failure.
            Err(QueryError::Acquisition { .. }) => {}
            Err(err) => panic!("unexpected error under contention: {err}"),
        }
    }
    assert!(succeeded > 0, "at least one caller must get a slot");
}

#[tokio::test]
#[ignore = "requires database"]
async fn full_write_path_scenario() {
    let store = test_store().await;
    let org_id = Uuid::new_v4();

    let request = sample_request(Uuid::new_v4(), org_id);
    store.insert_request(&request).await.expect("insert failed");

    let mut response = sample_response(Uuid::new_v4(), request.id, org_id);
    store
        .insert_response(&response)
        .await
        .expect("insert failed");

    response.completion_tokens = Some(42);
    response.response_received_at = Some(ts(12, 0, 0));
    store
        .update_response(&response)
        .await
        .expect("update failed");

    for rating in [1, 0] {
        store
            .upsert_feedback(&FeedbackRecord {
                response_id: response.id,
                rating,
                created_at: ts(12, 30, rating as u32),
            })
            .await
            .expect("upsert failed");
    }

    let stored_request = read_request(&store, request.id).await.expect("row missing");
    assert_eq!(stored_request.model, "gpt-4");

    let stored_response = read_response(&store, response.id).await.expect("row missing");
    assert_eq!(stored_response.http_status, 200);
    assert_eq!(stored_response.completion_tokens, Some(42));
    assert_eq!(stored_response.request_id, request.id);

    let feedback = read_feedback(&store, response.id).await;
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].rating, 0);

    store.close().await;
}
