//! Integration tests for end-to-end gateway flow

use crate::domain::exchange::ExchangeRecord;
use crate::infrastructure::audit_store::{AuditStore, AuditStoreError, MemoryAuditStore};
use crate::proxy::error_response::ErrorResponse;
use crate::proxy::headers::{API_KEY, AUTHORIZATION, X_REQUEST_ID};
use crate::proxy::test_utils::test_helpers::*;
use crate::proxy::types::ProviderTag;
use crate::signing::hash::hex_sha256;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const UNUSED_UPSTREAM: &str = "http://127.0.0.1:1";

struct FailingStore;

#[async_trait]
impl AuditStore for FailingStore {
    async fn insert(&self, _record: &ExchangeRecord) -> Result<(), AuditStoreError> {
        Err(AuditStoreError::Timeout(Duration::from_millis(1)))
    }
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_rewrite_forwards_stripped_path_with_api_key() {
    let upstream = spawn_upstream(Router::new().fallback(echo_handler)).await;
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(&format!("http://{upstream}"), UNUSED_UPSTREAM, store.clone());

    let response = gateway
        .router
        .clone()
        .oneshot(authenticated_post(
            "/azure/openai/deployments/foo/chat/completions?api-version=2024-02-01",
            r#"{"messages":[{"role":"user","content":"hi"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = body_json(response).await;
    assert_eq!(
        echoed["uri"],
        "/openai/deployments/foo/chat/completions?api-version=2024-02-01"
    );
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["headers"][API_KEY], json!([TEST_AZURE_KEY]));
    assert!(echoed["headers"].get(AUTHORIZATION.as_str()).is_none());
    assert_eq!(
        echoed["body"],
        r#"{"messages":[{"role":"user","content":"hi"}]}"#
    );

    assert_eq!(gateway.finish().await, 1);
    let record = &store.records()[0];
    assert_eq!(record.provider, ProviderTag::Azure);
    assert_eq!(record.path, "/azure/openai/deployments/foo/chat/completions");
    assert_eq!(record.request_body["messages"][0]["content"], "hi");
    assert_eq!(record.response_status, 200);
    assert!(record.completed);
    assert_eq!(record.request_headers["authorization"], vec!["<redacted>".to_string()]);
}

#[tokio::test]
async fn test_rewrite_strips_prefix_once_at_any_depth() {
    let upstream = spawn_upstream(Router::new().fallback(echo_handler)).await;
    let gateway = TestGateway::new(
        &format!("http://{upstream}"),
        UNUSED_UPSTREAM,
        Arc::new(MemoryAuditStore::new()),
    );

    let response = gateway
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/azure/azure/a/b/c/d")
                .header("authorization", bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(body_json(response).await["uri"], "/azure/a/b/c/d");
    gateway.finish().await;
}

#[tokio::test]
async fn test_sign_streams_chunks_and_logs_full_body() {
    let seen_headers: Arc<Mutex<Vec<(HeaderMap, Bytes)>>> = Arc::default();
    let seen = seen_headers.clone();
    let app = Router::new().route(
        "/model/{model}/converse-stream",
        post(move |headers: HeaderMap, body: Bytes| {
            let seen = seen.clone();
            async move {
                seen.lock().push((headers, body));
                let chunks = futures_util::stream::iter(["a", "b", "c"]).then(|chunk| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, Infallible>(chunk)
                });
                Body::from_stream(chunks)
            }
        }),
    );
    let upstream = spawn_upstream(app).await;
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, &format!("http://{upstream}"), store.clone());

    let request_body = r#"{"messages":[{"role":"user","content":[{"text":"hi"}]}]}"#;
    let response = gateway
        .router
        .clone()
        .oneshot(authenticated_post(
            "/bedrock/converse-stream/my-model",
            request_body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let mut frames = Vec::new();
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame.unwrap().into_data() {
            frames.push(data);
        }
    }
    assert_eq!(frames, vec!["a", "b", "c"]);

    assert_eq!(gateway.finish().await, 1);
    let record = &store.records()[0];
    assert_eq!(record.response_body, Value::String("abc".into()));
    assert_eq!(record.response_size, 3);
    assert_eq!(record.provider, ProviderTag::Bedrock);
    assert!(record.completed);

    let (headers, forwarded) = seen_headers.lock().pop().unwrap();
    assert_eq!(forwarded, request_body.as_bytes());
    assert_eq!(
        headers["x-amz-content-sha256"],
        hex_sha256(request_body.as_bytes()).as_str()
    );
    let authorization = headers[AUTHORIZATION].to_str().unwrap();
    assert!(authorization.starts_with(&format!(
        "AWS4-HMAC-SHA256 Credential={TEST_ACCESS_KEY}/"
    )));
    assert!(authorization.contains(&format!("/{TEST_REGION}/bedrock/aws4_request")));
    assert!(headers.contains_key("x-amz-date"));
}

#[tokio::test]
async fn test_unknown_action_never_reaches_upstream() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::OK
        }
    });
    let upstream = spawn_upstream(app).await;
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, &format!("http://{upstream}"), store.clone());

    let response = gateway
        .router
        .clone()
        .oneshot(authenticated_post("/bedrock/chat/my-model", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(error.code, "INVALID_ACTION");
    assert_eq!(
        error.message,
        "Invalid action. Use invoke, invoke-with-stream, converse, or converse-stream"
    );
    assert!(error.request_id.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(gateway.finish().await, 1);
    assert_eq!(store.records()[0].response_status, 400);
}

#[tokio::test]
async fn test_failing_audit_store_does_not_change_response() {
    let app = Router::new().fallback(|| async {
        axum::Json(json!({ "choices": [{ "message": { "content": "hello" } }] }))
    });
    let upstream = format!("http://{}", spawn_upstream(app).await);

    let healthy = TestGateway::new(&upstream, UNUSED_UPSTREAM, Arc::new(MemoryAuditStore::new()));
    let failing = TestGateway::new(&upstream, UNUSED_UPSTREAM, Arc::new(FailingStore));

    let path = "/azure/openai/deployments/foo/chat/completions";
    let ok = healthy
        .router
        .clone()
        .oneshot(authenticated_post(path, "{}"))
        .await
        .unwrap();
    let degraded = failing
        .router
        .clone()
        .oneshot(authenticated_post(path, "{}"))
        .await
        .unwrap();

    assert_eq!(ok.status(), degraded.status());
    assert_eq!(body_bytes(ok).await, body_bytes(degraded).await);

    assert_eq!(healthy.finish().await, 1);
    assert_eq!(failing.finish().await, 0);
}

#[tokio::test]
async fn test_unreachable_upstream_returns_bad_gateway() {
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, UNUSED_UPSTREAM, store.clone());

    let response = gateway
        .router
        .clone()
        .oneshot(authenticated_post("/azure/openai/models", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(error.code, "BAD_GATEWAY");

    assert_eq!(gateway.finish().await, 1);
    assert_eq!(store.records()[0].provider, ProviderTag::Azure);
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected_and_not_audited() {
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, UNUSED_UPSTREAM, store.clone());

    let response = gateway
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bedrock/invoke/my-model")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    body_bytes(response).await;

    assert_eq!(gateway.finish().await, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_health_bypasses_auth_and_audit() {
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, UNUSED_UPSTREAM, store.clone());

    let response = gateway
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, "OK");
    assert_eq!(gateway.finish().await, 0);
}

#[tokio::test]
async fn test_unknown_prefix_and_malformed_sign_path_are_not_found() {
    let gateway = TestGateway::new(
        UNUSED_UPSTREAM,
        UNUSED_UPSTREAM,
        Arc::new(MemoryAuditStore::new()),
    );

    let unknown = gateway
        .router
        .clone()
        .oneshot(authenticated_post("/vertex/models/x", "{}"))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = gateway
        .router
        .clone()
        .oneshot(authenticated_post("/bedrock/invoke", "{}"))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::NOT_FOUND);
    body_bytes(malformed).await;

    let wrong_method = gateway
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/bedrock/invoke/my-model")
                .header("authorization", bearer())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    body_bytes(wrong_method).await;

    // The malformed and wrong-method exchanges reached the capture layer
    assert_eq!(gateway.finish().await, 2);
}

#[tokio::test]
async fn test_oversized_request_is_rejected_and_audited() {
    let store = Arc::new(MemoryAuditStore::new());
    let gateway = TestGateway::new(UNUSED_UPSTREAM, UNUSED_UPSTREAM, store.clone());

    let oversized = "x".repeat(1024 * 1024 + 1);
    let response = gateway
        .router
        .clone()
        .oneshot(authenticated_post("/azure/openai/models", &oversized))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_json(response).await;

    assert_eq!(gateway.finish().await, 1);
    let record = &store.records()[0];
    assert_eq!(record.response_status, 413);
    assert_eq!(record.request_body, Value::Null);
    assert_eq!(record.response_body, body);
    assert_eq!(record.provider, ProviderTag::Unknown);
    assert!(record.completed);
}
