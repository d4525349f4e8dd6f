//! Database models for users.

use crate::api::models::users::UserUpdate;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub login: String,
    pub display_name: Option<String>,
    pub password_hash: String,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdateDBRequest {
    /// Build an update from the API payload, with the password already hashed
    pub fn new(update: UserUpdate, password_hash: Option<String>) -> Self {
        Self {
            display_name: update.display_name,
            password_hash,
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub login: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
