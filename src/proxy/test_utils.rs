//! Test utilities for gateway testing
//!
//! This module provides utilities to make testing gateway components easier,
//! including mock upstreams, a fully wired router and token helpers.
