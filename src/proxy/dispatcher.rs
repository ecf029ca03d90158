//! Route-key dispatch: the first path segment selects exactly one adapter

use crate::providers::Adapter;
use crate::proxy::error_response::{extract_request_id, gateway_error_response};
use crate::proxy::types::{GatewayError, RouteKey};
use axum::{
    extract::{Request, State},
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("route key {0} is already registered")]
pub struct RouteConflict(pub RouteKey);

/// Static table from route key to adapter, built once at startup
#[derive(Debug, Default)]
pub struct Dispatcher {
    routes: HashMap<String, (RouteKey, Arc<Adapter>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `key`; each key may be bound once
    pub fn register(&mut self, key: RouteKey, adapter: Adapter) -> Result<(), RouteConflict> {
        let lookup = key.as_ref().to_string();
        if self.routes.contains_key(&lookup) {
            return Err(RouteConflict(key));
        }
        self.routes.insert(lookup, (key, Arc::new(adapter)));
        Ok(())
    }

    /// Adapter for `path` and the raw remainder after the route key
    ///
    /// The remainder keeps its leading `/` and its original percent-encoding,
    /// so `/azure/openai/models` yields `/openai/models`.
    pub fn select<'a>(&self, path: &'a str) -> Option<(Arc<Adapter>, &'a str)> {
        let trimmed = path.strip_prefix('/')?;
        let (segment, rest) = match trimmed.find('/') {
            Some(index) => (&trimmed[..index], &trimmed[index..]),
            None => (trimmed, ""),
        };
        self.routes
            .get(segment)
            .map(|(_, adapter)| (adapter.clone(), rest))
    }

    pub fn route_keys(&self) -> impl Iterator<Item = &RouteKey> {
        self.routes.values().map(|(key, _)| key)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Handler for every gateway route: select, forward, and tag the response
/// with the provider that produced it
pub async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
) -> Response {
    let path = request.uri().path().to_string();
    let request_id = extract_request_id(request.headers());

    let Some((adapter, rest)) = dispatcher.select(&path) else {
        return gateway_error_response(&GatewayError::MalformedPath(path.clone()), request_id);
    };
    let provider = adapter.provider();

    let mut response = match adapter.forward(request, rest).await {
        Ok(response) => response,
        Err(e) => gateway_error_response(&e, request_id),
    };
    response.extensions_mut().insert(provider);
    response
}
