//! AWS Bedrock runtime provider
//!
//! ## Features
//!
//! - Fixed action table onto the InvokeModel and Converse operations,
//!   streaming and non-streaming
//! - SigV4 signing with credentials from the AWS default provider chain
//! - Event-stream responses passed through unparsed

pub mod credentials;
pub mod provider;
pub mod types;

pub use credentials::{AwsCredentialChain, CredentialError, CredentialSource, StaticCredentialSource};
pub use provider::BedrockProvider;
pub use types::{AwsRegion, BedrockAction, ModelId};
