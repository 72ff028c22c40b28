//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, the caller's actor)
//! 2. Calls the matching engine operation
//! 3. Returns HTTP response (JSON, status code)

/// Availability, quotes, bookings and payments
pub mod bookings;
pub mod health;
/// Cancellations and refunds
pub mod refunds;
pub mod wallet;
