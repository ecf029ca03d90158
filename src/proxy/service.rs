//! Main gateway service implementation
//!
//! The `GatewayService` ties the dispatcher, the capture layer and the
//! middleware stack into one axum router.
//!
//! ## Service Lifecycle
//!
//! ```rust,ignore
//! use audit_gateway::proxy::{GatewayService, AuthConfig};
//!
//! // 1. Build the dispatcher and the audit logger
//! let service = GatewayService::new(dispatcher, capture_state, AuthConfig::hs256(secret));
//!
//! // 2. Convert to an axum router
//! let router = service.into_router();
//!
//! // 3. Serve with axum, keeping peer addresses for the audit trail
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```
//!
//! ## Request path
//!
//! request id → trace span → access log → auth → capture → dispatch → adapter

use crate::proxy::capture::{capture_middleware, CaptureState};
use crate::proxy::dispatcher::{dispatch_handler, Dispatcher};
use crate::proxy::headers::paths::HEALTH;
use crate::proxy::middleware::AuthConfig;
use crate::proxy::middleware_stack::GatewayMiddlewareStack;
use axum::{
    middleware::from_fn_with_state,
    routing::{any, get},
    Router,
};
use std::sync::Arc;

/// Gateway service: provider routes plus an unauthenticated health check
pub struct GatewayService {
    dispatcher: Arc<Dispatcher>,
    capture: CaptureState,
    auth: AuthConfig,
}

impl GatewayService {
    pub fn new(dispatcher: Dispatcher, capture: CaptureState, auth: AuthConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            capture,
            auth,
        }
    }

    /// Create an axum router for the gateway with middleware
    pub fn into_router(self) -> Router {
        let mut gateway = Router::new();
        for key in self.dispatcher.route_keys() {
            gateway = gateway.route(&format!("/{key}/{{*rest}}"), any(dispatch_handler));
        }
        if !self.dispatcher.is_empty() {
            gateway = gateway.route_layer(from_fn_with_state(self.capture, capture_middleware));
        }

        let router = Router::new()
            .route(HEALTH, get(health_handler))
            .merge(gateway.with_state(self.dispatcher));

        GatewayMiddlewareStack::new(self.auth).apply_to_router(router)
    }
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}
