//! Data models representing engine entities and request types.

/// Authenticated caller identity
pub mod actor;
/// API key authentication model
pub mod api_key;
/// Bookings, stay windows and payment modes
pub mod booking;
/// Coupons, mappings and usages
pub mod coupon;
/// Hotels, rooms and price adjustments
pub mod hotel;
/// Payment records
pub mod payment;
/// Refund requests
pub mod refund;
/// Wallet accounts and ledger rows
pub mod wallet;
