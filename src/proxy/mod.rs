//! Gateway request path
//!
//! This module implements the request-facing half of the gateway:
//! - Dispatch: the first path segment selects one provider adapter
//! - Capture: every response byte sent to the client is mirrored into an
//!   exchange record
//! - Audit path: records are handed to a background worker over a bounded
//!   queue, so persistence never holds up a response

pub mod audit_path;
pub mod capture;
pub mod dispatcher;
pub mod error_response;
pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod service;
pub mod test_utils;
pub mod types;

#[cfg(test)]
mod integration_tests;

pub use audit_path::{AuditLogger, AuditWorker};
pub use capture::CaptureState;
pub use dispatcher::Dispatcher;
pub use middleware::AuthConfig;
pub use service::GatewayService;
pub use types::{GatewayError, GatewayResult};
