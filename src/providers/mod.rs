//! Upstream provider adapters
//!
//! Two ways of reaching an upstream are supported, and they form a closed
//! set: rewriting the request and injecting a static key (Azure OpenAI), or
//! mapping it onto a fixed runtime operation and signing it with SigV4
//! (Bedrock). Both return the upstream response as a stream so that bytes
//! reach the client as soon as they arrive.

pub mod azure;
pub mod bedrock;
pub mod constants;

pub use azure::AzureOpenAiProvider;
pub use bedrock::BedrockProvider;

use crate::infrastructure::log_messages::upstream;
use crate::proxy::headers::copy_end_to_end;
use crate::proxy::types::{GatewayError, GatewayResult, ProviderTag};
use axum::{body::Body, extract::Request, response::Response};
use http::HeaderMap;
use std::time::Duration;
use tracing::error;

/// The adapter selected for one route key
#[derive(Debug)]
pub enum Adapter {
    /// Rewrite-and-forward with a static API key
    Rewrite(AzureOpenAiProvider),
    /// Sign-and-forward with SigV4
    Sign(BedrockProvider),
}

impl Adapter {
    pub fn provider(&self) -> ProviderTag {
        match self {
            Self::Rewrite(_) => ProviderTag::Azure,
            Self::Sign(_) => ProviderTag::Bedrock,
        }
    }

    /// Forward `request` upstream; `rest` is the raw path after the route key,
    /// starting with `/`
    pub async fn forward(&self, request: Request, rest: &str) -> GatewayResult<Response> {
        match self {
            Self::Rewrite(provider) => provider.forward(request, rest).await,
            Self::Sign(provider) => provider.forward(request, rest).await,
        }
    }
}

/// HTTP client shared by all adapters
pub fn build_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
}

/// Turn an upstream response into a client response without buffering:
/// status and end-to-end headers are copied, the body is polled lazily
pub fn stream_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::new();
    copy_end_to_end(upstream.headers(), &mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Classify a failed upstream send
pub(crate) fn upstream_error(provider: ProviderTag, e: reqwest::Error) -> GatewayError {
    error!(provider = %provider, error = %e, "{}", upstream::UPSTREAM_FAILED);
    if e.is_builder() {
        GatewayError::RequestConstruction(e.to_string())
    } else {
        GatewayError::UpstreamUnreachable(e.to_string())
    }
}
