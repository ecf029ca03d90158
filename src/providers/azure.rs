//! Azure OpenAI provider: rewrite the path, swap client auth for the static
//! `api-key`, and stream the upstream answer back

use crate::infrastructure::log_messages::upstream;
use crate::providers::constants::azure::STRIPPED_CLIENT_HEADERS;
use crate::providers::{stream_response, upstream_error};
use crate::proxy::capture::read_body;
use crate::proxy::headers::{is_hop_by_hop, API_KEY};
use crate::proxy::types::{
    ApiKey, BodySizeLimit, GatewayError, GatewayResult, ProviderTag, UpstreamBaseUrl,
};
use axum::{extract::Request, response::Response};
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AzureOpenAiProvider {
    base_url: UpstreamBaseUrl,
    api_key: ApiKey,
    client: reqwest::Client,
    max_body: BodySizeLimit,
}

impl AzureOpenAiProvider {
    pub fn new(
        base_url: UpstreamBaseUrl,
        api_key: ApiKey,
        client: reqwest::Client,
        max_body: BodySizeLimit,
    ) -> Self {
        Self {
            base_url,
            api_key,
            client,
            max_body,
        }
    }

    /// Upstream URL for the path remaining after the route key
    pub fn target_url(&self, rest: &str, query: Option<&str>) -> String {
        match query {
            Some(query) => self.base_url.join(&format!("{rest}?{query}")),
            None => self.base_url.join(rest),
        }
    }

    /// Client headers minus hop-by-hop and credential headers, plus the
    /// configured `api-key`
    pub fn outbound_headers(&self, client_headers: &HeaderMap) -> GatewayResult<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(client_headers.len() + 1);
        for (name, value) in client_headers.iter() {
            if is_hop_by_hop(name) || STRIPPED_CLIENT_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        let mut api_key = HeaderValue::from_str(self.api_key.as_ref())
            .map_err(|e| GatewayError::RequestConstruction(e.to_string()))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY), api_key);

        Ok(headers)
    }

    pub async fn forward(&self, request: Request, rest: &str) -> GatewayResult<Response> {
        let (parts, body) = request.into_parts();
        let body = read_body(body, self.max_body).await?;

        let url = self.target_url(rest, parts.uri.query());
        let headers = self.outbound_headers(&parts.headers)?;
        debug!(method = %parts.method, url = %url, "{}", upstream::FORWARDING);

        let response = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| upstream_error(ProviderTag::Azure, e))?;

        Ok(stream_response(response))
    }
}
