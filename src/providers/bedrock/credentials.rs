//! Credential retrieval for request signing
//!
//! Credentials are fetched per request and never cached here; the AWS
//! default chain does its own refresh of temporary credentials.

use crate::providers::bedrock::types::AwsRegion;
use crate::signing::SigningCredential;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("no credentials provider is configured")]
    NoProvider,

    #[error("credentials provider failed: {0}")]
    Provider(String),
}

/// Source of signing credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn retrieve(&self, region: &AwsRegion) -> Result<SigningCredential, CredentialError>;
}

/// The standard AWS provider chain: environment, profile files, web identity,
/// container and instance metadata
#[derive(Debug, Clone)]
pub struct AwsCredentialChain {
    provider: SharedCredentialsProvider,
}

impl AwsCredentialChain {
    /// Resolve the default chain for `region`
    pub async fn load(region: &AwsRegion) -> Result<Self, CredentialError> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.as_ref().to_string()))
            .load()
            .await;

        config
            .credentials_provider()
            .map(|provider| Self { provider })
            .ok_or(CredentialError::NoProvider)
    }

    pub fn from_provider(provider: SharedCredentialsProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CredentialSource for AwsCredentialChain {
    async fn retrieve(&self, _region: &AwsRegion) -> Result<SigningCredential, CredentialError> {
        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| CredentialError::Provider(e.to_string()))?;

        Ok(SigningCredential::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
        ))
    }
}

/// Fixed credential, for tests and for endpoints that accept long-lived keys
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    credential: SigningCredential,
}

impl StaticCredentialSource {
    pub fn new(credential: SigningCredential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn retrieve(&self, _region: &AwsRegion) -> Result<SigningCredential, CredentialError> {
        Ok(self.credential.clone())
    }
}
