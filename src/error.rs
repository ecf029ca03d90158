use crate::infrastructure::audit_store::AuditStoreError;
use crate::providers::bedrock::CredentialError;
use crate::proxy::dispatcher::RouteConflict;
use thiserror::Error;

/// Audit gateway startup and lifecycle errors
///
/// Request-time failures never surface here; they are mapped to client
/// responses by [`crate::proxy::GatewayError`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Audit store error: {0}")]
    AuditStore(#[from] AuditStoreError),

    #[error("AWS credentials error: {0}")]
    Credentials(#[from] CredentialError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("Routing error: {0}")]
    Route(#[from] RouteConflict),
}

impl Error {
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
