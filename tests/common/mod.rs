//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use hotel_booking_engine::{
    engine::{Engine, EngineSettings},
    integrations::{GatewayError, NotificationDispatcher, NotifyError, PaymentGateway},
    models::{
        actor::Actor,
        booking::{BookingType, CreateBookingRequest, RequestedPaymentMode},
        coupon::{Coupon, CouponBookingScope, CouponStatus, DiscountType},
        hotel::{Hotel, Room, RoomStatus},
    },
    store::MemoryStore,
};

/// Gateway double. Signatures are valid when they equal `sig:<order>|<payment>`.
#[derive(Default)]
pub struct FakeGateway {
    pub fail_orders: AtomicBool,
    pub order_count: AtomicUsize,
    pub refunds: Mutex<Vec<(String, i64)>>,
}

impl FakeGateway {
    pub fn signature(order_id: &str, payment_id: &str) -> String {
        format!("sig:{}|{}", order_id, payment_id)
    }

    pub fn refunds(&self) -> Vec<(String, i64)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, _amount_cents: i64, _currency: &str, _receipt: &str) -> Result<String, GatewayError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "gateway unavailable".to_string(),
            });
        }
        let n = self.order_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("order_{}", n))
    }

    async fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<bool, GatewayError> {
        Ok(signature == Self::signature(order_id, payment_id))
    }

    async fn refund(&self, payment_id: &str, amount_cents: i64) -> Result<String, GatewayError> {
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push((payment_id.to_string(), amount_cents));
        Ok(format!("rfnd_{}", refunds.len()))
    }
}

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Uuid, Value)>>,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect()
    }

    /// Notifications run on spawned tasks; wait until `count` have arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.templates()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify(&self, template_key: &str, user_id: Uuid, variables: Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((template_key.to_string(), user_id, variables));
        Ok(())
    }
}

/// Fails every notification.
pub struct FailingNotifier;

#[async_trait]
impl NotificationDispatcher for FailingNotifier {
    async fn notify(&self, _template_key: &str, _user_id: Uuid, _variables: Value) -> Result<(), NotifyError> {
        Err(NotifyError::Status(500))
    }
}

pub struct Fixture {
    pub engine: Engine<MemoryStore>,
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub hotel: Hotel,
    pub room: Room,
    pub owner: Actor,
    pub guest: Actor,
    pub admin: Actor,
}

impl Fixture {
    /// One hotel (24 h window, 20% fee, both payment modes) with one
    /// 1000.00/night room for two guests.
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let owner = Actor::hotel_owner(Uuid::new_v4());
        let hotel = Hotel {
            id: Uuid::new_v4(),
            owner_id: owner.user_id,
            city_id: Some(Uuid::new_v4()),
            name: "Grand Plaza".to_string(),
            online_payment_enabled: true,
            offline_payment_enabled: true,
            cancellation_time_hours: 24,
            cancellation_fee_percentage: 20.0,
        };
        let room = room_at(&hotel, "101");

        store.add_hotel(hotel.clone()).await;
        store.add_room(room.clone()).await;

        let engine = Engine::new(
            store.clone(),
            gateway.clone(),
            notifier.clone(),
            EngineSettings::default(),
        );

        Self {
            engine,
            store,
            gateway,
            notifier,
            hotel,
            room,
            owner,
            guest: Actor::guest(Uuid::new_v4()),
            admin: Actor::admin(Uuid::new_v4()),
        }
    }

    /// Same fixture with notifications that always fail.
    pub async fn with_failing_notifier() -> Self {
        let mut fixture = Self::new().await;
        fixture.engine = Engine::new(
            fixture.store.clone(),
            fixture.gateway.clone(),
            Arc::new(FailingNotifier),
            EngineSettings::default(),
        );
        fixture
    }

    pub async fn add_room(&self, room_number: &str) -> Room {
        let room = room_at(&self.hotel, room_number);
        self.store.add_room(room.clone()).await;
        room
    }

    pub async fn add_coupon(&self, code: &str, percent: f64, usage_limit: Option<i32>) -> Coupon {
        let now = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: code.to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: percent,
            max_discount_cents: None,
            min_order_cents: 0,
            valid_from: now - chrono::Duration::days(30),
            valid_to: now + chrono::Duration::days(30),
            usage_limit,
            used_count: 0,
            applicable_booking_types: CouponBookingScope::Both,
            status: CouponStatus::Active,
            created_at: now,
        };
        self.store.add_coupon(coupon.clone()).await;
        coupon
    }
}

pub fn room_at(hotel: &Hotel, room_number: &str) -> Room {
    Room {
        id: Uuid::new_v4(),
        hotel_id: hotel.id,
        room_type_id: Some(Uuid::new_v4()),
        room_number: room_number.to_string(),
        price_per_night_cents: 100_000,
        price_per_hour_cents: Some(8_000),
        capacity: 2,
        status: RoomStatus::Available,
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn request(
    room: &Room,
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
    payment_mode: RequestedPaymentMode,
    quoted_total_cents: i64,
) -> CreateBookingRequest {
    CreateBookingRequest {
        room_id: room.id,
        check_in,
        check_out,
        guest_count: 2,
        booking_type: BookingType::Daily,
        coupon_code: None,
        payment_mode,
        quoted_total_cents,
    }
}

pub fn offline() -> RequestedPaymentMode {
    RequestedPaymentMode::Offline { advance_cents: None }
}
