//! Log message constants for infrastructure components
//!
//! This module centralizes the fixed log messages emitted across the gateway
//! so operators can grep for them reliably.

/// Application startup and lifecycle messages
pub mod application {
    pub const STARTING: &str = "Starting audit gateway";
    pub const LISTENING: &str = "Gateway listening";
    pub const SHUTDOWN_SIGNAL: &str = "Shutdown signal received, draining connections";
    pub const STOPPED: &str = "Gateway stopped";
}

/// Database-related log messages
pub mod database {
    pub const CONNECTING: &str = "Connecting to audit database";
    pub const CONNECTION_ESTABLISHED: &str = "Audit database connection established";
    pub const SCHEMA_READY: &str = "Audit table ready";
    pub const MEMORY_BACKEND: &str =
        "Using in-memory audit store, exchange records are not persisted";
}

/// Audit queue and worker messages
pub mod audit {
    pub const WORKER_STARTED: &str = "Audit worker started";
    pub const WORKER_STOPPED: &str = "Audit worker stopped";
    pub const QUEUE_FULL: &str = "Audit queue full, exchange record dropped";
    pub const QUEUE_CLOSED: &str = "Audit queue closed, exchange record dropped";
    pub const INSERT_FAILED: &str = "Failed to persist exchange record";
    pub const DRAIN_TIMEOUT: &str = "Audit worker did not drain before the shutdown deadline";
    pub const STREAM_ABORTED: &str = "Response stream ended before completion";
}

/// Upstream credential and forwarding messages
pub mod upstream {
    pub const CREDENTIALS_LOADED: &str = "AWS credential chain initialised";
    pub const FORWARDING: &str = "Forwarding request upstream";
    pub const UPSTREAM_FAILED: &str = "Upstream request failed";
}
