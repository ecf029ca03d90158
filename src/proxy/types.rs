//! Type definitions for the proxy module

use crate::signing::SigningError;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// ========== Size and Capacity Types ==========

/// Maximum size for buffered request bodies in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0)
)]
pub struct BodySizeLimit(usize);

impl BodySizeLimit {
    pub fn bytes(&self) -> usize {
        *self.as_ref()
    }
}

/// Number of exchange records the audit queue may hold before dropping
#[nutype(
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |capacity: &usize| *capacity > 0)
)]
pub struct QueueCapacity(usize);

// ========== Routing Types ==========

/// Leading path segment that selects a provider adapter
///
/// Route keys are a single lowercase segment (`azure`, `bedrock`), never
/// containing a slash, so the dispatcher can match them against the first
/// segment of an inbound path.
#[nutype(
    sanitize(trim, lowercase),
    validate(
        not_empty,
        predicate = |s: &str| s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    ),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, AsRef, Serialize, Deserialize)
)]
pub struct RouteKey(String);

/// Provider that handled an exchange, recorded on every audit entry
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    #[display("azure")]
    Azure,
    #[display("bedrock")]
    Bedrock,
    #[display("unknown")]
    Unknown,
}

/// Request ID for correlating access logs, error bodies and audit records
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new RequestId with a v7 UUID
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a propagated request id, rejecting anything that is not a UUID
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Upstream Types ==========

/// Base URL of an upstream provider endpoint
#[nutype(
    sanitize(trim),
    validate(predicate = |s: &str| {
        (s.starts_with("http://") || s.starts_with("https://")) && s.parse::<http::Uri>().is_ok()
    }),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef)
)]
pub struct UpstreamBaseUrl(String);

impl UpstreamBaseUrl {
    /// Append an already provider-correct path (and query) to the base URL
    pub fn join(&self, path_and_query: &str) -> String {
        format!("{}{}", self.as_ref().trim_end_matches('/'), path_and_query)
    }
}

/// Static credential injected by the rewrite adapter
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Clone, PartialEq, Eq, Deserialize, TryFrom, AsRef)
)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Errors surfaced by the dispatch and adapter layer
///
/// Each variant maps to one coarse client-facing category in
/// [`crate::proxy::error_response`]; upstream detail stays in the logs.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("No route for path: {0}")]
    MalformedPath(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(http::Method),

    #[error("Request body exceeds {limit} bytes")]
    RequestTooLarge { limit: BodySizeLimit },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Failed to build upstream request: {0}")]
    RequestConstruction(String),

    #[error("Credential retrieval failed: {0}")]
    Credentials(String),

    #[error("Credential retrieval timed out after {0:?}")]
    CredentialTimeout(Duration),

    #[error("Request signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
