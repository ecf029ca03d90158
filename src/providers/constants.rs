//! Constants for provider interactions

use std::time::Duration;

/// Bedrock runtime signing identity and defaults
pub mod bedrock {
    use super::Duration;

    /// Service name used in the SigV4 credential scope
    pub const SIGNING_SERVICE: &str = "bedrock";

    /// Upper bound on one credential retrieval when none is configured
    pub const DEFAULT_CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(5);

    /// Number of path segments after the routing prefix: action and model id
    pub const ROUTE_SEGMENTS: usize = 2;
}

/// Headers the rewrite adapter never copies from the client
pub mod azure {
    pub const STRIPPED_CLIENT_HEADERS: [&str; 4] =
        ["host", "authorization", "api-key", "content-length"];
}
