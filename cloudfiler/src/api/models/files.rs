//! API request/response models for shared files.

use super::pagination::Pagination;
use crate::db::handlers::files::TagMatch;
use crate::db::models::files::FileDBResponse;
use crate::types::{FileId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FileId,
    #[schema(value_type = String, format = "uuid")]
    pub owner: UserId,
    pub name: String,
    pub content_type: String,
    /// Size of the content in bytes
    pub size: u64,
    pub tags: Vec<String>,
    #[schema(value_type = Vec<String>)]
    pub permitted_users: Vec<UserId>,
    #[schema(value_type = Vec<String>)]
    pub permitted_roles: Vec<RoleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileDBResponse> for FileResponse {
    fn from(db: FileDBResponse) -> Self {
        Self {
            id: db.id,
            owner: db.owner,
            name: db.name,
            content_type: db.content_type,
            size: db.size,
            tags: db.tags.into_iter().collect(),
            permitted_users: db.permitted_users.into_iter().collect(),
            permitted_roles: db.permitted_roles.into_iter().collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListFilesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Query parameters for tag search
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchFilesQuery {
    /// Comma-separated tags. Matching is exact and case-sensitive.
    pub tags: Option<String>,
    /// `all` (default): files carrying every tag. `any`: files carrying at least one.
    #[param(inline)]
    pub mode: Option<TagMatch>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Request body for renaming a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FileUpdate {
    pub name: Option<String>,
}

/// Users to grant or revoke access
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileUsersRequest {
    #[schema(value_type = Vec<String>)]
    pub user_ids: Vec<UserId>,
}

/// Roles to grant or revoke access
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileRolesRequest {
    #[schema(value_type = Vec<String>)]
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagsResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FileId,
    pub tags: Vec<String>,
}
