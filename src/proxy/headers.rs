//! HTTP header constants and utilities for the gateway
//!
//! This module centralizes all HTTP header names and header-related
//! constants used throughout the gateway to ensure consistency.

use ::http::header::{self, HeaderMap, HeaderName};

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the static Azure OpenAI credential
pub const API_KEY: &str = "api-key";

/// Authorization header prefix for bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Value recorded in audit logs instead of credential-bearing headers
pub const REDACTED: &str = "<redacted>";

/// Standard header re-exports for convenience
pub use header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Well-known paths
pub mod paths {
    /// Health check endpoint path
    pub const HEALTH: &str = "/health";
}

/// Common content types
pub mod content_types {
    pub const APPLICATION_JSON: &str = "application/json";
}

/// Connection-scoped headers that a proxy must not forward in either direction
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Copy every end-to-end header from `source` into `target`
pub fn copy_end_to_end(source: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in source.iter() {
        if !is_hop_by_hop(name) {
            target.append(name.clone(), value.clone());
        }
    }
}
