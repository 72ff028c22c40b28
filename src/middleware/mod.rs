//! HTTP middleware components.
//!
//! Middleware run before route handlers. Here they authenticate requests
//! and short-circuit the ones without a valid API key.

/// API key authentication middleware
pub mod auth;
