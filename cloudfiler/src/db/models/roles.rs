//! Database models for roles and role memberships.

use crate::api::models::roles::{RoleCreate, RoleUpdate};
use crate::types::RoleId;
use chrono::{DateTime, Utc};

/// Database request for creating a new role
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
}

impl From<RoleCreate> for RoleCreateDBRequest {
    fn from(create: RoleCreate) -> Self {
        Self {
            name: create.name,
            description: create.description,
        }
    }
}

/// Database request for updating a role
#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl From<RoleUpdate> for RoleUpdateDBRequest {
    fn from(update: RoleUpdate) -> Self {
        Self {
            name: update.name,
            description: update.description,
        }
    }
}

/// Database response for a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
