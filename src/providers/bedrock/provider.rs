//! AWS Bedrock provider implementation

use crate::infrastructure::log_messages::upstream;
use crate::providers::bedrock::{
    credentials::CredentialSource,
    types::{AwsRegion, BedrockAction, ModelId},
};
use crate::providers::constants::bedrock::{
    DEFAULT_CREDENTIAL_TIMEOUT, ROUTE_SEGMENTS, SIGNING_SERVICE,
};
use crate::providers::{stream_response, upstream_error};
use crate::proxy::capture::read_body;
use crate::proxy::headers::{content_types::APPLICATION_JSON, ACCEPT, CONTENT_TYPE};
use crate::proxy::types::{
    BodySizeLimit, GatewayError, GatewayResult, ProviderTag, UpstreamBaseUrl,
};
use crate::signing::{hash::hex_sha256, RequestSigner, SigningCredential};
use axum::{extract::Request, response::Response};
use chrono::Utc;
use http::{HeaderMap, HeaderValue, Method, Uri};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// AWS Bedrock runtime provider
#[derive(Clone)]
pub struct BedrockProvider {
    region: AwsRegion,
    base_url: String,
    signer: RequestSigner,
    credentials: Arc<dyn CredentialSource>,
    credential_timeout: Duration,
    client: reqwest::Client,
    max_body: BodySizeLimit,
}

impl std::fmt::Debug for BedrockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockProvider")
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .field("credential_timeout", &self.credential_timeout)
            .finish_non_exhaustive()
    }
}

impl BedrockProvider {
    /// Create a provider for the public runtime endpoint of `region`
    pub fn new(
        region: AwsRegion,
        credentials: Arc<dyn CredentialSource>,
        client: reqwest::Client,
        max_body: BodySizeLimit,
    ) -> Self {
        Self {
            base_url: region.runtime_endpoint(),
            signer: RequestSigner::new(SIGNING_SERVICE, region.as_ref()),
            region,
            credentials,
            credential_timeout: DEFAULT_CREDENTIAL_TIMEOUT,
            client,
            max_body,
        }
    }

    /// Point the provider at a different endpoint (private link, tests)
    pub fn with_base_url(mut self, base_url: UpstreamBaseUrl) -> Self {
        self.base_url = base_url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credential_timeout(mut self, timeout: Duration) -> Self {
        self.credential_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Split `/{action}/{modelId}` into its typed parts
    pub fn parse_route(rest: &str) -> GatewayResult<(BedrockAction, ModelId)> {
        let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
        if segments.len() != ROUTE_SEGMENTS || segments.iter().any(|s| s.is_empty()) {
            return Err(GatewayError::MalformedPath(rest.to_string()));
        }

        let action = segments[0]
            .parse::<BedrockAction>()
            .map_err(|e| GatewayError::UnknownAction(e.0))?;

        let model = urlencoding::decode(segments[1])
            .map_err(|e| GatewayError::MalformedPath(e.to_string()))?;
        let model = ModelId::try_new(model.into_owned())
            .map_err(|e| GatewayError::MalformedPath(e.to_string()))?;

        Ok((action, model))
    }

    /// Upstream URL for an action on a model
    pub fn target_url(&self, action: BedrockAction, model: &ModelId) -> String {
        format!("{}{}", self.base_url, action.upstream_path(model))
    }

    async fn credential(&self) -> GatewayResult<SigningCredential> {
        match tokio::time::timeout(self.credential_timeout, self.credentials.retrieve(&self.region))
            .await
        {
            Ok(Ok(credential)) => Ok(credential),
            Ok(Err(e)) => Err(GatewayError::Credentials(e.to_string())),
            Err(_) => Err(GatewayError::CredentialTimeout(self.credential_timeout)),
        }
    }

    pub async fn forward(&self, request: Request, rest: &str) -> GatewayResult<Response> {
        if request.method() != Method::POST {
            return Err(GatewayError::MethodNotAllowed(request.method().clone()));
        }
        let (action, model) = Self::parse_route(rest)?;

        let (parts, body) = request.into_parts();
        let body = read_body(body, self.max_body).await?;
        let payload_hash = hex_sha256(&body);

        let url = self.target_url(action, &model);
        let uri: Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| GatewayError::RequestConstruction(e.to_string()))?;

        let mut headers = HeaderMap::new();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(CONTENT_TYPE, content_type);
        if let Some(accept) = parts.headers.get(ACCEPT) {
            headers.insert(ACCEPT, accept.clone());
        }

        let credential = self.credential().await?;
        let signed = self.signer.sign(
            &Method::POST,
            &uri,
            &headers,
            &payload_hash,
            &credential,
            Utc::now(),
        )?;
        signed.apply(&mut headers)?;

        debug!(
            action = action.as_str(),
            streaming = action.is_streaming(),
            model = %model,
            url = %url,
            "{}",
            upstream::FORWARDING
        );

        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| upstream_error(ProviderTag::Bedrock, e))?;

        Ok(stream_response(response))
    }
}
