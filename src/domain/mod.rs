//! Domain types for the audit gateway
//!
//! An exchange is one client request and the response the gateway relayed
//! for it; the exchange record is the unit of audit persistence.

pub mod exchange;

pub use exchange::ExchangeRecord;
