//! Infrastructure layer for the audit gateway
//!
//! This module contains the implementations for external concerns: the
//! audit store backends and the shared log messages.

pub mod audit_store;
pub mod database;
pub mod log_messages;

pub use audit_store::{AuditStore, AuditStoreError, MemoryAuditStore};
pub use database::{AuditTable, PostgresAuditStore};
