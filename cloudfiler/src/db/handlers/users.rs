//! Repository for user accounts.

use crate::db::{
    Database,
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::Utc;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: usize,
    pub limit: usize,
}

impl UserFilter {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }
}

pub struct Users<'d> {
    db: &'d Database,
}

impl<'d> Users<'d> {
    pub fn new(db: &'d Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, login), err)]
    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<UserDBResponse>> {
        let tables = self.db.read().await;
        Ok(tables.users.values().find(|u| u.login == login).cloned())
    }
}

#[async_trait::async_trait]
impl<'d> Repository for Users<'d> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(login = %request.login), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tables = self.db.write().await;

        if tables.users.values().any(|u| u.login == request.login) {
            return Err(DbError::UniqueViolation {
                table: "users",
                field: "login",
                conflicting_value: request.login.clone(),
            });
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            login: request.login.clone(),
            display_name: request.display_name.clone(),
            password_hash: request.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        Ok(self.db.read().await.users.get(&id).cloned())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let tables = self.db.read().await;
        Ok(ids
            .into_iter()
            .filter_map(|id| tables.users.get(&id).map(|u| (id, u.clone())))
            .collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tables = self.db.read().await;
        let mut users: Vec<_> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users.into_iter().skip(filter.skip).take(filter.limit).collect())
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tables = self.db.write().await;
        let user = tables.users.get_mut(&id).ok_or(DbError::NotFound)?;

        if let Some(display_name) = &request.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(password_hash) = &request.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(login: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            login: login.to_string(),
            display_name: None,
            password_hash: "not-a-real-hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let db = Database::new();
        let repo = Users::new(&db);

        let user = repo.create(&create_request("alice")).await.unwrap();
        assert_eq!(user.login, "alice");

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);

        let by_login = repo.get_user_by_login("alice").await.unwrap().unwrap();
        assert_eq!(by_login.id, user.id);

        assert!(repo.get_user_by_login("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let db = Database::new();
        let repo = Users::new(&db);

        repo.create(&create_request("bob")).await.unwrap();
        let err = repo.create(&create_request("bob")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { table: "users", .. }));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_paginated() {
        let db = Database::new();
        let repo = Users::new(&db);
        for login in ["carol", "alice", "bob"] {
            repo.create(&create_request(login)).await.unwrap();
        }

        let page = repo.list(&UserFilter::new(1, 10)).await.unwrap();
        let logins: Vec<_> = page.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(logins, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let db = Database::new();
        let repo = Users::new(&db);
        let err = repo.update(Uuid::new_v4(), &UserUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }
}
