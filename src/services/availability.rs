//! Room availability.
//!
//! Stays are half-open `[check_in, check_out)`: a guest checking out at noon
//! does not block the next guest checking in at noon.
//!
//! The answer is only authoritative inside the unit of work that inserts the
//! booking, after the room row has been locked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::{Booking, StayWindow},
    hotel::{Room, RoomStatus},
};
use crate::store::{Store, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    RoomNotBookable { status: RoomStatus },
    OverCapacity { requested: i32, capacity: i32 },
    Overlap { booking_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

impl Availability {
    fn free() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    fn blocked(reason: UnavailableReason) -> Self {
        Self {
            available: false,
            reason: Some(reason),
        }
    }

    /// Capacity problems are bad input; everything else is a conflict with
    /// the room's current state.
    pub fn into_result(self) -> Result<(), AppError> {
        match self.reason {
            None => Ok(()),
            Some(UnavailableReason::OverCapacity {
                requested,
                capacity,
            }) => Err(AppError::Validation(format!(
                "Guest count {} exceeds room capacity {}",
                requested, capacity
            ))),
            Some(UnavailableReason::RoomNotBookable { status }) => Err(AppError::Conflict(format!(
                "Room is not bookable while {:?}",
                status
            ))),
            Some(UnavailableReason::Overlap { .. }) => Err(AppError::Conflict(
                "Room is already booked for the requested dates".to_string(),
            )),
        }
    }
}

/// Half-open interval overlap.
pub fn overlaps(
    a_check_in: DateTime<Utc>,
    a_check_out: DateTime<Utc>,
    b_check_in: DateTime<Utc>,
    b_check_out: DateTime<Utc>,
) -> bool {
    a_check_in < b_check_out && a_check_out > b_check_in
}

/// Decide availability from already-loaded bookings.
///
/// `exclude_booking` skips one booking, used when reinstating a cancelled
/// booking that is itself in the list.
pub fn evaluate(
    room: &Room,
    stay: &StayWindow,
    guest_count: i32,
    existing: &[Booking],
    exclude_booking: Option<Uuid>,
) -> Availability {
    if !room.status.is_bookable() {
        return Availability::blocked(UnavailableReason::RoomNotBookable {
            status: room.status,
        });
    }
    if guest_count > room.capacity {
        return Availability::blocked(UnavailableReason::OverCapacity {
            requested: guest_count,
            capacity: room.capacity,
        });
    }

    let clash = existing
        .iter()
        .filter(|b| b.is_active() && Some(b.id) != exclude_booking)
        .find(|b| overlaps(b.check_in, b.check_out, stay.check_in, stay.check_out));

    match clash {
        Some(booking) => Availability::blocked(UnavailableReason::Overlap {
            booking_id: booking.id,
        }),
        None => Availability::free(),
    }
}

/// Check a room inside an open unit of work.
pub async fn check_availability<U: UnitOfWork>(
    uow: &mut U,
    room: &Room,
    stay: &StayWindow,
    guest_count: i32,
    exclude_booking: Option<Uuid>,
) -> Result<Availability, AppError> {
    if guest_count < 1 {
        return Err(AppError::Validation(
            "Guest count must be at least 1".to_string(),
        ));
    }

    let existing = uow.active_bookings_for_room(room.id).await?;
    Ok(evaluate(room, stay, guest_count, &existing, exclude_booking))
}

/// Standalone availability query. Reads only.
pub async fn is_available<S: Store>(
    store: &S,
    room_id: Uuid,
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    guest_count: i32,
) -> Result<Availability, AppError> {
    let stay = StayWindow::new(check_in, check_out)?;

    let mut uow = store.begin().await?;
    let room = uow.find_room(room_id).await?.ok_or(AppError::NotFound("room"))?;
    let availability = check_availability(&mut uow, &room, &stay, guest_count, None).await?;
    uow.rollback().await?;

    Ok(availability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingStatus, BookingType, PaymentMode, PaymentStatus};
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
    }

    fn room(capacity: i32, status: RoomStatus) -> Room {
        Room {
            id: Uuid::new_v4(),
            hotel_id: Uuid::new_v4(),
            room_type_id: None,
            room_number: "101".to_string(),
            price_per_night_cents: 100_000,
            price_per_hour_cents: None,
            capacity,
            status,
        }
    }

    fn booking(room: &Room, check_in: DateTime<Utc>, check_out: DateTime<Utc>, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            room_id: room.id,
            hotel_id: room.hotel_id,
            user_id: Uuid::new_v4(),
            booking_type: BookingType::Daily,
            check_in,
            check_out,
            guest_count: 1,
            base_cents: 100_000,
            discount_cents: 0,
            total_cents: 100_000,
            coupon_id: None,
            payment_mode: PaymentMode::Online,
            status,
            payment_status: PaymentStatus::Pending,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: day(1),
            updated_at: day(1),
        }
    }

    #[test]
    fn half_open_overlap() {
        assert!(overlaps(day(1), day(3), day(2), day(4)));
        assert!(overlaps(day(1), day(5), day(2), day(3)));
        assert!(!overlaps(day(1), day(3), day(3), day(5)));
        assert!(!overlaps(day(3), day(5), day(1), day(3)));
    }

    #[test]
    fn overlapping_active_booking_blocks() {
        let room = room(2, RoomStatus::Available);
        let existing = vec![booking(&room, day(2), day(4), BookingStatus::Confirmed)];
        let stay = StayWindow::new(day(3), day(5)).unwrap();

        let result = evaluate(&room, &stay, 1, &existing, None);
        assert!(!result.available);
        assert!(matches!(result.reason, Some(UnavailableReason::Overlap { .. })));
        assert!(matches!(result.into_result(), Err(AppError::Conflict(_))));
    }

    #[test]
    fn cancelled_and_excluded_bookings_are_ignored() {
        let room = room(2, RoomStatus::Available);
        let cancelled = booking(&room, day(2), day(4), BookingStatus::Cancelled);
        let pending = booking(&room, day(2), day(4), BookingStatus::Pending);
        let stay = StayWindow::new(day(2), day(4)).unwrap();

        assert!(evaluate(&room, &stay, 1, &[cancelled], None).available);
        assert!(evaluate(&room, &stay, 1, &[pending.clone()], Some(pending.id)).available);
        assert!(!evaluate(&room, &stay, 1, &[pending], None).available);
    }

    #[test]
    fn capacity_is_a_validation_error() {
        let room = room(2, RoomStatus::Available);
        let stay = StayWindow::new(day(1), day(2)).unwrap();
        let result = evaluate(&room, &stay, 3, &[], None);
        assert!(matches!(result.into_result(), Err(AppError::Validation(_))));
    }

    #[test]
    fn maintenance_rooms_are_not_bookable() {
        let stay = StayWindow::new(day(1), day(2)).unwrap();
        for status in [RoomStatus::Maintenance, RoomStatus::OutOfOrder] {
            let result = evaluate(&room(2, status), &stay, 1, &[], None);
            assert_eq!(
                result.reason,
                Some(UnavailableReason::RoomNotBookable { status })
            );
        }
        assert!(evaluate(&room(2, RoomStatus::Occupied), &stay, 1, &[], None).available);
    }
}
