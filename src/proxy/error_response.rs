//! Unified error response handling for the gateway
//!
//! This module provides consistent error formatting across all middleware
//! and handlers. Client-facing bodies only ever carry a coarse category;
//! the detailed cause is written to the local log.

use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::types::GatewayError;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Standard error response format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Unique error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request ID for correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Add request ID for correlation
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Convert to HTTP response with proper headers
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let request_id = self.request_id.clone();
        let mut response = (status, Json(self)).into_response();

        if let Some(id) = request_id {
            if let Ok(header_value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(X_REQUEST_ID, header_value);
            }
        }

        response
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for GatewayError {
    fn to_error_response(&self) -> ErrorResponse {
        use GatewayError::*;

        match self {
            UnknownAction(_) => ErrorResponse::new(
                "INVALID_ACTION",
                "Invalid action. Use invoke, invoke-with-stream, converse, or converse-stream",
            ),
            MalformedPath(_) => ErrorResponse::new("NOT_FOUND", "Resource not found"),
            MethodNotAllowed(_) => ErrorResponse::new("METHOD_NOT_ALLOWED", "Method not allowed"),
            RequestTooLarge { limit } => ErrorResponse::new(
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds {limit} bytes"),
            ),
            BodyRead(_) => ErrorResponse::new("BAD_REQUEST", "Failed to read request body"),
            RequestConstruction(_) => {
                ErrorResponse::new("INTERNAL_ERROR", "Failed to create upstream request")
            }
            Credentials(_) | CredentialTimeout(_) => {
                ErrorResponse::new("CREDENTIALS_ERROR", "Failed to retrieve upstream credentials")
            }
            Signing(_) => ErrorResponse::new("SIGNING_ERROR", "Failed to sign upstream request"),
            UpstreamUnreachable(_) => {
                ErrorResponse::new("BAD_GATEWAY", "Upstream service unreachable")
            }
            Unauthorized => ErrorResponse::new("UNAUTHORIZED", "Authentication required"),
        }
    }

    fn status_code(&self) -> StatusCode {
        use GatewayError::*;

        match self {
            UnknownAction(_) | BodyRead(_) => StatusCode::BAD_REQUEST,
            MalformedPath(_) => StatusCode::NOT_FOUND,
            MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Unauthorized => StatusCode::UNAUTHORIZED,
            UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            RequestConstruction(_) | Credentials(_) | CredentialTimeout(_) | Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        gateway_error_response(&self, None)
    }
}

/// Log `error` locally and render its coarse client-facing form
pub fn gateway_error_response(error: &GatewayError, request_id: Option<String>) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        error!(
            error = %error,
            status = status.as_u16(),
            request_id = ?request_id,
            "Gateway request failed"
        );
    } else {
        warn!(
            error = %error,
            status = status.as_u16(),
            request_id = ?request_id,
            "Gateway request rejected"
        );
    }

    let mut body = error.to_error_response();
    if let Some(id) = request_id {
        body = body.with_request_id(id);
    }
    body.into_response_with_status(status)
}

/// Helper to extract request ID from headers
pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}
