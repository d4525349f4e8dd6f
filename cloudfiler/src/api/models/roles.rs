//! API request/response models for roles.

use super::pagination::Pagination;
use crate::api::models::users::UserResponse;
use crate::db::models::roles::RoleDBResponse;
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListRolesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Request body for creating a new role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleCreate {
    /// Role name (must be unique). This is the name privilege rules refer to.
    #[schema(example = "Editors")]
    pub name: String,
    pub description: Option<String>,
}

/// Request body for updating a role. Only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Users to add to or remove from a role
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleMembersRequest {
    #[schema(value_type = Vec<String>)]
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Members of the role (only included on single-role lookups and membership changes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<UserResponse>>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
            members: None,
        }
    }
}

impl RoleResponse {
    pub fn with_members(mut self, members: Vec<UserResponse>) -> Self {
        self.members = Some(members);
        self
    }
}
