//! Type definitions for the AWS Bedrock runtime provider

use nutype::nutype;
use std::str::FromStr;
use thiserror::Error;

/// AWS region for Bedrock
#[nutype(
    sanitize(trim, lowercase),
    validate(
        not_empty,
        predicate = |s: &str| s.split('-').count() >= 3
            && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    ),
    derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize, AsRef)
)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Public runtime endpoint for this region
    pub fn runtime_endpoint(&self) -> String {
        format!("https://bedrock-runtime.{}.amazonaws.com", self.as_ref())
    }
}

/// Model ID as used by Bedrock, e.g. `anthropic.claude-v2:1`
#[nutype(
    sanitize(trim),
    validate(not_empty, predicate = |s: &str| !s.contains('/')),
    derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize, AsRef)
)]
pub struct ModelId(String);

impl ModelId {
    /// The model id as a single percent-encoded path segment
    pub fn path_segment(&self) -> String {
        urlencoding::encode(self.as_ref()).into_owned()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown Bedrock action: {0}")]
pub struct UnknownAction(pub String);

/// Client-facing action names and the runtime operation each maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BedrockAction {
    Invoke,
    InvokeWithStream,
    Converse,
    ConverseStream,
}

impl BedrockAction {
    pub const ALL: [BedrockAction; 4] = [
        Self::Invoke,
        Self::InvokeWithStream,
        Self::Converse,
        Self::ConverseStream,
    ];

    /// Action name as it appears in the gateway path
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::InvokeWithStream => "invoke-with-stream",
            Self::Converse => "converse",
            Self::ConverseStream => "converse-stream",
        }
    }

    /// Final path segment of the runtime operation
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Invoke => "invoke",
            Self::InvokeWithStream => "invoke-with-response-stream",
            Self::Converse => "converse",
            Self::ConverseStream => "converse-stream",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::InvokeWithStream | Self::ConverseStream)
    }

    /// Upstream path for this action, with the model id encoded as one segment
    pub fn upstream_path(&self, model: &ModelId) -> String {
        format!("/model/{}/{}", model.path_segment(), self.operation())
    }
}

impl FromStr for BedrockAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
