//! Repository for shared files and their access grants.

use crate::api::models::users::CurrentUser;
use crate::auth::permissions::can_access_file;
use crate::db::{
    Database, Tables,
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::files::{FileCreateDBRequest, FileDBResponse, FileUpdateDBRequest},
};
use crate::types::{FileId, RoleId, UserId, abbrev_uuid};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// How a tag predicate combines several tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// File carries every requested tag
    #[default]
    All,
    /// File carries at least one requested tag
    Any,
}

/// Filter for listing and searching files
#[derive(Debug, Clone)]
pub struct FileFilter {
    /// Only return files this principal may access. `None` lists everything.
    pub viewer: Option<CurrentUser>,
    /// Tag predicate; empty matches every file
    pub tags: BTreeSet<String>,
    pub tag_match: TagMatch,
    pub skip: usize,
    pub limit: usize,
}

impl FileFilter {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            viewer: None,
            tags: BTreeSet::new(),
            tag_match: TagMatch::All,
            skip,
            limit,
        }
    }

    pub fn visible_to(mut self, viewer: CurrentUser) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn with_tags(mut self, tags: BTreeSet<String>, tag_match: TagMatch) -> Self {
        self.tags = tags;
        self.tag_match = tag_match;
        self
    }

    fn matches(&self, file: &FileDBResponse) -> bool {
        if let Some(viewer) = &self.viewer
            && !can_access_file(viewer, file)
        {
            return false;
        }
        if self.tags.is_empty() {
            return true;
        }
        match self.tag_match {
            TagMatch::All => self.tags.is_subset(&file.tags),
            TagMatch::Any => !self.tags.is_disjoint(&file.tags),
        }
    }
}

/// Trim tags and drop empty ones. Matching is exact, so case is preserved.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub struct Files<'d> {
    db: &'d Database,
    actor: Option<UserId>,
}

impl<'d> Files<'d> {
    pub fn new(db: &'d Database) -> Self {
        Self { db, actor: None }
    }

    /// Only apply mutations if `user` may access the file when the change is
    /// made. A file the user has lost access to looks missing.
    pub fn acting_as(mut self, user: &CurrentUser) -> Self {
        self.actor = Some(user.id);
        self
    }

    /// Apply `change` to one file under the write lock and bump `updated_at`.
    async fn mutate<F>(&self, id: FileId, change: F) -> Result<FileDBResponse>
    where
        F: FnOnce(&Tables, &mut FileDBResponse) -> Result<()>,
    {
        let mut guard = self.db.write().await;
        let tables = &mut *guard;
        let mut file = tables.files.get(&id).cloned().ok_or(DbError::NotFound)?;
        if let Some(actor) = self.actor
            && !tables.may_access(actor, &file)
        {
            return Err(DbError::NotFound);
        }
        change(tables, &mut file)?;
        file.updated_at = Utc::now();
        tables.files.insert(id, file.clone());
        Ok(file)
    }

    #[instrument(skip(self, user_ids), fields(file_id = %abbrev_uuid(&id), count = user_ids.len()), err)]
    pub async fn add_users(&self, id: FileId, user_ids: &[UserId]) -> Result<FileDBResponse> {
        self.mutate(id, |tables, file| {
            if user_ids.iter().any(|u| !tables.users.contains_key(u)) {
                return Err(DbError::NotFound);
            }
            file.permitted_users.extend(user_ids.iter().copied());
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, user_ids), fields(file_id = %abbrev_uuid(&id), count = user_ids.len()), err)]
    pub async fn remove_users(&self, id: FileId, user_ids: &[UserId]) -> Result<FileDBResponse> {
        self.mutate(id, |_, file| {
            for user_id in user_ids {
                file.permitted_users.remove(user_id);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, role_ids), fields(file_id = %abbrev_uuid(&id), count = role_ids.len()), err)]
    pub async fn add_roles(&self, id: FileId, role_ids: &[RoleId]) -> Result<FileDBResponse> {
        self.mutate(id, |tables, file| {
            if role_ids.iter().any(|r| !tables.roles.contains_key(r)) {
                return Err(DbError::NotFound);
            }
            file.permitted_roles.extend(role_ids.iter().copied());
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, role_ids), fields(file_id = %abbrev_uuid(&id), count = role_ids.len()), err)]
    pub async fn remove_roles(&self, id: FileId, role_ids: &[RoleId]) -> Result<FileDBResponse> {
        self.mutate(id, |_, file| {
            for role_id in role_ids {
                file.permitted_roles.remove(role_id);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, tags), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn add_tags(&self, id: FileId, tags: BTreeSet<String>) -> Result<FileDBResponse> {
        self.mutate(id, |_, file| {
            file.tags.extend(tags);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, tags), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn remove_tags(&self, id: FileId, tags: BTreeSet<String>) -> Result<FileDBResponse> {
        self.mutate(id, |_, file| {
            file.tags.retain(|t| !tags.contains(t));
            Ok(())
        })
        .await
    }

    /// Replace the whole tag set
    #[instrument(skip(self, tags), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn set_tags(&self, id: FileId, tags: BTreeSet<String>) -> Result<FileDBResponse> {
        self.mutate(id, |_, file| {
            file.tags = tags;
            Ok(())
        })
        .await
    }

    /// Remove a file record, returning it if it existed
    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&self, id: FileId) -> Result<Option<FileDBResponse>> {
        Ok(self.db.write().await.files.remove(&id))
    }
}

#[async_trait::async_trait]
impl<'d> Repository for Files<'d> {
    type CreateRequest = FileCreateDBRequest;
    type UpdateRequest = FileUpdateDBRequest;
    type Response = FileDBResponse;
    type Id = FileId;
    type Filter = FileFilter;

    #[instrument(skip(self, request), fields(owner = %abbrev_uuid(&request.owner), name = %request.name), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tables = self.db.write().await;
        if !tables.users.contains_key(&request.owner) {
            return Err(DbError::NotFound);
        }

        let now = Utc::now();
        let file = FileDBResponse {
            id: Uuid::new_v4(),
            owner: request.owner,
            name: request.name.clone(),
            content_type: request.content_type.clone(),
            size: request.size,
            tags: request.tags.clone(),
            permitted_users: BTreeSet::new(),
            permitted_roles: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        tables.files.insert(file.id, file.clone());
        Ok(file)
    }

    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.db.read().await.files.get(&id).cloned())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let tables = self.db.read().await;
        Ok(ids
            .into_iter()
            .filter_map(|id| tables.files.get(&id).map(|f| (id, f.clone())))
            .collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, tags = filter.tags.len()), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tables = self.db.read().await;
        let mut files: Vec<_> = tables.files.values().filter(|f| filter.matches(f)).cloned().collect();
        files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(files.into_iter().skip(filter.skip).take(filter.limit).collect())
    }

    #[instrument(skip(self, request), fields(file_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        self.mutate(id, |_, file| {
            if let Some(name) = &request.name {
                file.name = name.clone();
            }
            Ok(())
        })
        .await
    }
}
