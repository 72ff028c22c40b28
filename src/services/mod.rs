//! Business logic services.
//!
//! Services contain the booking engine's rules, separated from HTTP
//! handlers. Every operation opens its own unit of work through the store
//! and commits it exactly once; the `*_in` helpers join a caller's unit of
//! work instead.

pub mod availability;
pub mod booking_service;
pub mod coupon_service;
pub mod pricing;
pub mod refund_service;
pub mod wallet_service;

use crate::error::AppError;
use crate::models::{actor::Actor, hotel::Hotel};

/// Admins act for every hotel; hotel owners only for their own.
pub(crate) fn ensure_hotel_operator(actor: &Actor, hotel: &Hotel) -> Result<(), AppError> {
    if actor.is_admin() || actor.owns_hotel(hotel.owner_id) {
        return Ok(());
    }
    tracing::warn!(user_id = %actor.user_id, hotel_id = %hotel.id, "Hotel operation denied");
    Err(AppError::Authorization(
        "Only the hotel owner or an admin may do this".to_string(),
    ))
}
