//! Repository for roles and role memberships.

use crate::db::{
    Database,
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
};
use crate::types::{RoleId, UserId, abbrev_uuid};
use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing roles
#[derive(Debug, Clone)]
pub struct RoleFilter {
    pub skip: usize,
    pub limit: usize,
}

impl RoleFilter {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }
}

pub struct Roles<'d> {
    db: &'d Database,
}

impl<'d> Roles<'d> {
    pub fn new(db: &'d Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let tables = self.db.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    /// Delete a role and its memberships.
    ///
    /// Refuses with [`DbError::Referenced`] while any file still grants access to
    /// the role. Returns `false` if the role did not exist.
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&self, id: RoleId) -> Result<bool> {
        let mut tables = self.db.write().await;
        if !tables.roles.contains_key(&id) {
            return Ok(false);
        }

        let mut referencing: Vec<_> = tables
            .files
            .values()
            .filter(|f| f.permitted_roles.contains(&id))
            .map(|f| f.name.clone())
            .collect();
        if !referencing.is_empty() {
            referencing.sort();
            return Err(DbError::Referenced {
                entity_type: "role",
                entity_id: id.to_string(),
                referenced_by: format!("files [{}]", referencing.join(", ")),
            });
        }

        tables.memberships.retain(|(_, role_id)| *role_id != id);
        tables.roles.remove(&id);
        Ok(true)
    }

    /// Add a user to a role. Adding an existing member is a no-op.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), role_id = %abbrev_uuid(&role_id)), err)]
    pub async fn add_user(&self, user_id: UserId, role_id: RoleId) -> Result<()> {
        let mut tables = self.db.write().await;
        if !tables.users.contains_key(&user_id) || !tables.roles.contains_key(&role_id) {
            return Err(DbError::NotFound);
        }
        tables.memberships.insert((user_id, role_id));
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), role_id = %abbrev_uuid(&role_id)), err)]
    pub async fn remove_user(&self, user_id: UserId, role_id: RoleId) -> Result<()> {
        let mut tables = self.db.write().await;
        if tables.memberships.remove(&(user_id, role_id)) {
            Ok(())
        } else {
            Err(DbError::NotFound)
        }
    }

    /// Add several users to a role at once. Fails without changes if any of them is unknown.
    #[instrument(skip(self, user_ids), fields(role_id = %abbrev_uuid(&role_id), count = user_ids.len()), err)]
    pub async fn add_users(&self, role_id: RoleId, user_ids: &[UserId]) -> Result<()> {
        let mut tables = self.db.write().await;
        if !tables.roles.contains_key(&role_id) || user_ids.iter().any(|u| !tables.users.contains_key(u)) {
            return Err(DbError::NotFound);
        }
        tables.memberships.extend(user_ids.iter().map(|u| (*u, role_id)));
        Ok(())
    }

    /// Remove several users from a role. Users who are not members are skipped.
    #[instrument(skip(self, user_ids), fields(role_id = %abbrev_uuid(&role_id), count = user_ids.len()), err)]
    pub async fn remove_users(&self, role_id: RoleId, user_ids: &[UserId]) -> Result<()> {
        let mut tables = self.db.write().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(DbError::NotFound);
        }
        for user_id in user_ids {
            tables.memberships.remove(&(*user_id, role_id));
        }
        Ok(())
    }

    /// Member user ids of a role, in a stable order
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&role_id)), err)]
    pub async fn get_role_users(&self, role_id: RoleId) -> Result<Vec<UserId>> {
        let tables = self.db.read().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(DbError::NotFound);
        }
        Ok(tables.users_of(role_id).collect())
    }

    /// Roles a user belongs to, sorted by name
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_user_roles(&self, user_id: UserId) -> Result<Vec<RoleDBResponse>> {
        let tables = self.db.read().await;
        let mut roles: Vec<_> = tables.roles_of(user_id).filter_map(|id| tables.roles.get(&id).cloned()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}

#[async_trait::async_trait]
impl<'d> Repository for Roles<'d> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tables = self.db.write().await;
        if tables.roles.values().any(|r| r.name == request.name) {
            return Err(DbError::UniqueViolation {
                table: "roles",
                field: "name",
                conflicting_value: request.name.clone(),
            });
        }

        let now = Utc::now();
        let role = RoleDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.db.read().await.roles.get(&id).cloned())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let tables = self.db.read().await;
        Ok(ids
            .into_iter()
            .filter_map(|id| tables.roles.get(&id).map(|r| (id, r.clone())))
            .collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tables = self.db.read().await;
        let mut roles: Vec<_> = tables.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles.into_iter().skip(filter.skip).take(filter.limit).collect())
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tables = self.db.write().await;

        if let Some(name) = &request.name
            && tables.roles.values().any(|r| r.id != id && &r.name == name)
        {
            return Err(DbError::UniqueViolation {
                table: "roles",
                field: "name",
                conflicting_value: name.clone(),
            });
        }

        let role = tables.roles.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            role.name = name.clone();
        }
        if let Some(description) = &request.description {
            role.description = Some(description.clone());
        }
        role.updated_at = Utc::now();

        Ok(role.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Files, Users};
    use crate::db::models::{files::FileCreateDBRequest, users::UserCreateDBRequest};
    use std::collections::BTreeSet;

    async fn create_user(db: &Database, login: &str) -> UserId {
        Users::new(db)
            .create(&UserCreateDBRequest {
                login: login.to_string(),
                display_name: None,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn create_role(db: &Database, name: &str) -> RoleDBResponse {
        Roles::new(db)
            .create(&RoleCreateDBRequest {
                name: name.to_string(),
                description: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_membership_is_one_relation() {
        let db = Database::new();
        let user = create_user(&db, "alice").await;
        let role = create_role(&db, "Editors").await;
        let repo = Roles::new(&db);

        repo.add_user(user, role.id).await.unwrap();
        // Adding twice keeps set semantics
        repo.add_user(user, role.id).await.unwrap();

        assert_eq!(repo.get_role_users(role.id).await.unwrap(), vec![user]);
        assert_eq!(repo.get_user_roles(user).await.unwrap(), vec![role.clone()]);

        repo.remove_user(user, role.id).await.unwrap();
        assert!(repo.get_role_users(role.id).await.unwrap().is_empty());
        assert!(repo.get_user_roles(user).await.unwrap().is_empty());

        let err = repo.remove_user(user, role.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_user_roles_only_include_own_memberships() {
        let db = Database::new();
        let repo = Roles::new(&db);
        let mut users = Vec::new();
        for login in ["alice", "bob", "carol"] {
            users.push(create_user(&db, login).await);
        }
        let editors = create_role(&db, "Editors").await;
        let readers = create_role(&db, "Readers").await;

        repo.add_users(editors.id, &users).await.unwrap();
        repo.add_user(users[1], readers.id).await.unwrap();

        let role_ids = |roles: Vec<RoleDBResponse>| roles.into_iter().map(|r| r.id).collect::<BTreeSet<_>>();
        assert_eq!(role_ids(repo.get_user_roles(users[0]).await.unwrap()), BTreeSet::from([editors.id]));
        assert_eq!(
            role_ids(repo.get_user_roles(users[1]).await.unwrap()),
            BTreeSet::from([editors.id, readers.id])
        );
        assert_eq!(role_ids(repo.get_user_roles(users[2]).await.unwrap()), BTreeSet::from([editors.id]));
        assert!(repo.get_user_roles(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_user_or_role() {
        let db = Database::new();
        let user = create_user(&db, "alice").await;
        let role = create_role(&db, "Editors").await;
        let repo = Roles::new(&db);

        assert!(matches!(repo.add_user(Uuid::new_v4(), role.id).await, Err(DbError::NotFound)));
        assert!(matches!(repo.add_user(user, Uuid::new_v4()).await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_bulk_membership_changes_are_all_or_nothing() {
        let db = Database::new();
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let role = create_role(&db, "Editors").await;
        let repo = Roles::new(&db);

        let err = repo.add_users(role.id, &[alice, Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
        assert!(repo.get_role_users(role.id).await.unwrap().is_empty());

        repo.add_users(role.id, &[alice, bob]).await.unwrap();
        assert_eq!(repo.get_role_users(role.id).await.unwrap().len(), 2);

        repo.remove_users(role.id, &[alice, Uuid::new_v4()]).await.unwrap();
        assert_eq!(repo.get_role_users(role.id).await.unwrap(), vec![bob]);
    }

    #[tokio::test]
    async fn test_rename_to_existing_name_rejected() {
        let db = Database::new();
        create_role(&db, "Admin").await;
        let editors = create_role(&db, "Editors").await;
        let repo = Roles::new(&db);

        let err = repo
            .update(
                editors.id,
                &RoleUpdateDBRequest {
                    name: Some("Admin".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { table: "roles", .. }));

        // Renaming to its own name is fine
        let renamed = repo
            .update(
                editors.id,
                &RoleUpdateDBRequest {
                    name: Some("Editors".to_string()),
                    description: Some("People who edit".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.description.as_deref(), Some("People who edit"));
    }

    #[tokio::test]
    async fn test_delete_role_referenced_by_file_is_rejected() {
        let db = Database::new();
        let owner = create_user(&db, "owner").await;
        let role = create_role(&db, "Admin").await;
        let files = Files::new(&db);
        let file = files
            .create(&FileCreateDBRequest {
                owner,
                name: "report.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 3,
                tags: BTreeSet::new(),
            })
            .await
            .unwrap();
        files.add_roles(file.id, &[role.id]).await.unwrap();

        let repo = Roles::new(&db);
        let err = repo.delete(role.id).await.unwrap_err();
        assert!(matches!(err, DbError::Referenced { entity_type: "role", .. }));
        assert!(repo.get_by_id(role.id).await.unwrap().is_some());

        files.remove_roles(file.id, &[role.id]).await.unwrap();
        assert!(repo.delete(role.id).await.unwrap());
        assert!(repo.get_by_id(role.id).await.unwrap().is_none());
        assert!(!repo.delete(role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_role_drops_memberships() {
        let db = Database::new();
        let user = create_user(&db, "alice").await;
        let role = create_role(&db, "Temp").await;
        let repo = Roles::new(&db);
        repo.add_user(user, role.id).await.unwrap();

        assert!(repo.delete(role.id).await.unwrap());
        assert!(repo.get_user_roles(user).await.unwrap().is_empty());
    }
}
