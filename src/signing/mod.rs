//! AWS Signature Version 4 request signing
//!
//! The signer is a leaf component: it knows nothing about routing, adapters or
//! credential retrieval. Callers hand it the outbound method, URI, headers and
//! the hex digest of the fully materialized body, plus a credential and the
//! signing time, and get back the header set to attach.
//!
//! - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)

pub mod hash;
pub mod sigv4;

pub use sigv4::{RequestSigner, SignedRequestHeaders, SigningCredential};

use thiserror::Error;

/// Errors produced while building a signature
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("invalid signing key")]
    InvalidKey,

    #[error("request URI has no host")]
    MissingHost,

    #[error("header {0} is not valid visible ASCII")]
    InvalidHeaderValue(String),

    #[error("failed to decode request path: {0}")]
    InvalidPath(String),
}
