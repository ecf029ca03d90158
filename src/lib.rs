//! Audit Gateway - an authenticated gateway for LLM provider calls
//!
//! Clients call the gateway instead of Azure OpenAI or AWS Bedrock. Each
//! request is authenticated, forwarded to the provider (with a static key or
//! a SigV4 signature), streamed back unchanged, and recorded as an exchange
//! for later audit.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod providers;
pub mod proxy;
pub mod signing;

pub use application::Application;
pub use error::{Error, Result};
