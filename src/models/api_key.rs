//! API key model for authentication.
//!
//! Each key identifies one platform user and carries their role. Keys are
//! stored as SHA-256 hashes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::actor::{Actor, Role};

/// Represents an API key record from the `api_keys` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    /// Platform user the key belongs to
    pub user_id: Uuid,

    pub role: Role,

    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected during authentication.
    pub is_active: bool,
}

impl ApiKey {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}
