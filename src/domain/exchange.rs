//! The audit entry describing one client/upstream exchange

use crate::proxy::headers::{API_KEY, AUTHORIZATION, REDACTED};
use crate::proxy::types::{ProviderTag, RequestId};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request headers as recorded: lowercase name to every value sent
pub type RecordedHeaders = BTreeMap<String, Vec<String>>;

/// One completed (or aborted) exchange, persisted by the audit logger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub remote_addr: Option<String>,
    pub request_headers: RecordedHeaders,
    pub request_body: Value,
    pub response_status: u16,
    pub response_body: Value,
    /// Number of response bytes actually handed to the client
    pub response_size: u64,
    pub duration_ms: u64,
    pub provider: ProviderTag,
    /// False when the client went away or the upstream stream broke
    pub completed: bool,
}

/// Best-effort decode of a captured body
///
/// JSON documents are kept structured; anything else (event streams, plain
/// text, binary frames) is stored as a lossy UTF-8 string. Empty bodies
/// become `null`.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Snapshot request headers for the audit trail, redacting credentials
pub fn record_headers(headers: &HeaderMap) -> RecordedHeaders {
    let mut recorded = RecordedHeaders::new();
    for (name, value) in headers.iter() {
        let value = if *name == AUTHORIZATION || name.as_str() == API_KEY {
            REDACTED.to_string()
        } else {
            value.to_str().unwrap_or("<binary>").to_string()
        };
        recorded
            .entry(name.as_str().to_string())
            .or_default()
            .push(value);
    }
    recorded
}
