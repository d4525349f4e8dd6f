//! Database models for shared files.

use crate::types::{FileId, RoleId, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Database request for registering a new file
#[derive(Debug, Clone)]
pub struct FileCreateDBRequest {
    pub owner: UserId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub tags: BTreeSet<String>,
}

/// Database request for updating a file's metadata
#[derive(Debug, Clone, Default)]
pub struct FileUpdateDBRequest {
    pub name: Option<String>,
}

/// Database response for a file.
///
/// The owner is fixed at creation. Tags, permitted users and permitted roles
/// are sets, so duplicates are impossible by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDBResponse {
    pub id: FileId,
    pub owner: UserId,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub tags: BTreeSet<String>,
    pub permitted_users: BTreeSet<UserId>,
    pub permitted_roles: BTreeSet<RoleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
