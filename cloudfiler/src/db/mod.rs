//! Data access layer.
//!
//! Persistence is an external collaborator: the service only needs the
//! repository interfaces in [`handlers`]. This module ships an in-memory
//! [`Database`] that backs those interfaces, so the service runs without any
//! storage engine and tests get a fresh store per case.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - Users, Roles, Files)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - stored records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  Database   │  (single RwLock around all tables)
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Every repository method takes the table lock once for its whole duration.
//! Mutations hold the write lock, so two concurrent changes to the same file
//! or role are serialized and neither is lost; reads see a consistent
//! snapshot of users, roles, memberships and files together.
//!
//! Role membership is stored once, as a set of `(user, role)` pairs. "Roles of
//! a user" and "users of a role" are both read from that one relation, so they
//! cannot drift apart.
//!
//! ```ignore
//! use cloudfiler::db::{Database, handlers::{Roles, Repository}};
//!
//! let db = Database::new();
//! let roles = Roles::new(&db);
//! let admin = roles.create(&RoleCreateDBRequest { name: "Admin".into(), description: None }).await?;
//! roles.add_user(user_id, admin.id).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::db::models::{files::FileDBResponse, roles::RoleDBResponse, users::UserDBResponse};
use crate::types::{FileId, RoleId, UserId};

/// All stored records. Only reachable through [`Database::read`] / [`Database::write`].
#[derive(Debug, Default)]
pub struct Tables {
    pub(crate) users: HashMap<UserId, UserDBResponse>,
    pub(crate) roles: HashMap<RoleId, RoleDBResponse>,
    pub(crate) memberships: BTreeSet<(UserId, RoleId)>,
    pub(crate) files: HashMap<FileId, FileDBResponse>,
}

impl Tables {
    pub(crate) fn roles_of(&self, user_id: UserId) -> impl Iterator<Item = RoleId> + '_ {
        self.memberships
            .range((user_id, Uuid::nil())..=(user_id, Uuid::max()))
            .map(|(_, r)| *r)
    }

    pub(crate) fn users_of(&self, role_id: RoleId) -> impl Iterator<Item = UserId> + '_ {
        self.memberships.iter().filter(move |(_, r)| *r == role_id).map(|(u, _)| *u)
    }

    /// Access check against the current grants and memberships, for use while a lock is held
    pub(crate) fn may_access(&self, user_id: UserId, file: &FileDBResponse) -> bool {
        file.owner == user_id
            || file.permitted_users.contains(&user_id)
            || self.roles_of(user_id).any(|r| file.permitted_roles.contains(&r))
    }
}

/// In-memory store shared by every repository. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }
}
