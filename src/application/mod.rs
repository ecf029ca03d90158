//! Application wiring and lifecycle
//!
//! This module assembles the gateway from its settings: audit store, audit
//! worker, provider adapters and the HTTP router, and runs it until a
//! shutdown signal arrives.

pub mod app;
pub mod signal;

pub use app::Application;
