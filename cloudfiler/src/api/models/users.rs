//! API request/response models for users.

use super::pagination::Pagination;
use crate::db::models::{roles::RoleDBResponse, users::UserDBResponse};
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating a user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    /// Unique login name
    #[schema(example = "alice")]
    pub login: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Request body for updating a user. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    /// New password, hashed before storage
    pub password: Option<String>,
}

/// Role reference embedded in user responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
}

impl From<RoleDBResponse> for RoleSummary {
    fn from(db: RoleDBResponse) -> Self {
        Self { id: db.id, name: db.name }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub login: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Roles this user belongs to (only included on single-user lookups)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleSummary>>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            login: db.login,
            display_name: db.display_name,
            created_at: db.created_at,
            updated_at: db.updated_at,
            roles: None,
        }
    }
}

impl UserResponse {
    pub fn with_roles(mut self, roles: Vec<RoleSummary>) -> Self {
        self.roles = Some(roles);
        self
    }
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// The authenticated principal for the current request.
///
/// Roles are a snapshot taken when the request was authorized, so every
/// check within one request sees the same memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub login: String,
    pub display_name: Option<String>,
    pub roles: Vec<RoleSummary>,
}

impl CurrentUser {
    pub fn from_parts(user: UserDBResponse, roles: Vec<RoleDBResponse>) -> Self {
        Self {
            id: user.id,
            login: user.login,
            display_name: user.display_name,
            roles: roles.into_iter().map(RoleSummary::from).collect(),
        }
    }

    /// Whether the user holds a role with this exact name
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn holds_role_id(&self, id: RoleId) -> bool {
        self.roles.iter().any(|r| r.id == id)
    }
}
