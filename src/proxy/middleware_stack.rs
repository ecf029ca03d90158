//! Middleware stack builder for clean composition
//!
//! This module provides a builder pattern for composing the Tower middleware stack,
//! making it easier to maintain and test the middleware pipeline.

use crate::proxy::middleware::{
    auth_middleware, logging_middleware, request_id_middleware, AuthConfig,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builder for composing the gateway middleware stack
pub struct GatewayMiddlewareStack {
    auth_config: Arc<AuthConfig>,
}

impl GatewayMiddlewareStack {
    /// Create a new middleware stack builder
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }

    /// Apply the complete middleware stack to a router
    ///
    /// The middleware are applied in the following order (outer to inner):
    /// 1. Request ID generation/propagation
    /// 2. HTTP trace spans
    /// 3. Access logging (with request ID)
    /// 4. Authentication
    ///
    /// Rejected requests are logged but never reach the capture layer, which
    /// the service installs on the gateway routes only.
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            // Apply middleware in reverse order (innermost first in the builder)
            .layer(from_fn_with_state(self.auth_config, auth_middleware))
            .layer(from_fn(logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(request_id_middleware))
    }
}
