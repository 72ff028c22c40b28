//! Authenticated caller identity.
//!
//! Verifying who the caller is happens outside the engine; the engine only
//! receives the resulting `Actor` and uses it for ownership checks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "actor_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    HotelOwner,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn guest(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Guest,
        }
    }

    pub fn hotel_owner(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::HotelOwner,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Hotel owners act for hotels whose `owner_id` is their user id.
    pub fn owns_hotel(&self, owner_id: Uuid) -> bool {
        self.role == Role::HotelOwner && self.user_id == owner_id
    }
}
