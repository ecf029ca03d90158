//! Middleware implementations for the gateway service

use crate::proxy::error_response::{extract_request_id, gateway_error_response};
use crate::proxy::headers::{paths::HEALTH, AUTHORIZATION, BEARER_PREFIX, X_REQUEST_ID};
use crate::proxy::types::{GatewayError, RequestId};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configuration for authentication middleware
#[derive(Clone)]
pub struct AuthConfig {
    decoding_key: DecodingKey,
    validation: Validation,
    /// Paths that bypass authentication
    pub bypass_paths: HashSet<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("algorithms", &self.validation.algorithms)
            .field("bypass_paths", &self.bypass_paths)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    /// HS256 bearer tokens signed with `secret`; `exp` is enforced when the
    /// token carries one
    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            bypass_paths: HashSet::from([HEALTH.to_string()]),
        }
    }

    fn verify(&self, token: &str) -> Result<(), jsonwebtoken::errors::Error> {
        decode::<serde_json::Value>(token, &self.decoding_key, &self.validation).map(|_| ())
    }
}

/// Request ID middleware - ensures every request has a unique ID for tracing
///
/// A client-supplied `x-request-id` is kept when it is a UUID; anything else
/// is replaced with a fresh v7 id. The id is echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(RequestId::parse)
        .unwrap_or_default();

    match HeaderValue::from_str(&request_id.to_string()) {
        Ok(value) => {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
            let mut response = next.run(request).await;
            response.headers_mut().insert(X_REQUEST_ID, value);
            response
        }
        Err(_) => next.run(request).await,
    }
}

/// Authentication middleware - validates bearer JWTs
pub async fn auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if auth_config.bypass_paths.contains(request.uri().path()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim);

    let request_id = extract_request_id(request.headers());
    match token {
        Some(token) => match auth_config.verify(token) {
            Ok(()) => next.run(request).await,
            Err(e) => {
                warn!(request_id = ?request_id, error = %e, "Bearer token rejected");
                gateway_error_response(&GatewayError::Unauthorized, request_id)
            }
        },
        None => {
            warn!(request_id = ?request_id, "Missing or invalid Authorization header");
            gateway_error_response(&GatewayError::Unauthorized, request_id)
        }
    }
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request details before passing ownership
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = extract_request_id(request.headers()).unwrap_or_else(|| "unknown".into());

    info!(
        request_id = request_id,
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(request).await;

    // Headers are ready here; the body may still be streaming
    info!(
        request_id = request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = duration_ms(start.elapsed()),
        "Response started"
    );

    response
}

/// Whole milliseconds, saturating at `u64::MAX`
pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::error_response::ErrorResponse;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::{from_fn, from_fn_with_state};
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    async fn ok(_req: Request) -> Result<Response, std::convert::Infallible> {
        Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Body::empty())
            .unwrap())
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    async fn call_with_auth(authorization: Option<String>, path: &str) -> Response {
        let service = tower::ServiceBuilder::new()
            .layer(from_fn_with_state(
                Arc::new(AuthConfig::hs256(SECRET)),
                auth_middleware,
            ))
            .service(tower::service_fn(ok));

        let mut request = http::Request::builder().method("POST").uri(path);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        service
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_id_generation() {
        let handler = tower::service_fn(|req: Request| async move {
            let request_id = req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("missing")
                .to_string();

            Ok::<_, std::convert::Infallible>(
                Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from(request_id))
                    .unwrap(),
            )
        });

        let service = tower::ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .service(handler);

        let request = http::Request::builder()
            .method("GET")
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = service.oneshot(request).await.unwrap();
        let header = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        let uuid = Uuid::parse_str(&header).unwrap();
        assert_eq!(uuid.get_version_num(), 7);

        let seen = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(seen, header.as_bytes());
    }

    #[tokio::test]
    async fn test_request_id_propagates_valid_uuid_and_replaces_garbage() {
        let service = tower::ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .service(tower::service_fn(ok));

        let existing = Uuid::now_v7().to_string();
        let response = service
            .clone()
            .oneshot(
                http::Request::builder()
                    .uri("/test")
                    .header(X_REQUEST_ID, &existing)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], existing.as_str());

        let response = service
            .oneshot(
                http::Request::builder()
                    .uri("/test")
                    .header(X_REQUEST_ID, "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(response.headers()[X_REQUEST_ID], "not-a-uuid");
    }

    #[tokio::test]
    async fn test_auth_middleware_valid_token() {
        let bearer = format!("Bearer {}", token(json!({ "sub": "client-1" }), SECRET));
        let response = call_with_auth(Some(bearer), "/azure/openai/models").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_middleware_wrong_secret() {
        let bearer = format!("Bearer {}", token(json!({ "sub": "client-1" }), "other"));
        let response = call_with_auth(Some(bearer), "/azure/openai/models").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_auth_middleware_expired_token() {
        let expired = chrono::Utc::now().timestamp() - 3_600;
        let bearer = format!(
            "Bearer {}",
            token(json!({ "sub": "client-1", "exp": expired }), SECRET)
        );
        let response = call_with_auth(Some(bearer), "/bedrock/invoke/m").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_middleware_missing_header() {
        let response = call_with_auth(None, "/bedrock/invoke/m").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = call_with_auth(Some("Basic dXNlcjpwYXNz".into()), "/bedrock/invoke/m").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_auth_bypass_health_check() {
        let response = call_with_auth(None, HEALTH).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_micros(1_500_900)), 1_500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
