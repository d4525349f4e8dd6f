//! Principal lookups used by the authenticator.

use async_trait::async_trait;

use crate::api::models::users::CurrentUser;
use crate::db::{
    Database,
    errors::Result,
    handlers::{Repository, Roles, Users},
    models::{roles::RoleDBResponse, users::UserDBResponse},
};
use crate::types::{RoleId, UserId};

/// Resolves users to roles and roles to users.
///
/// Both directions read the same membership relation, so they always agree.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    async fn get_user_by_login(&self, login: &str) -> Result<Option<UserDBResponse>>;

    async fn get_roles_for_user(&self, id: UserId) -> Result<Vec<RoleDBResponse>>;

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>>;

    async fn get_users_for_role(&self, id: RoleId) -> Result<Vec<UserId>>;

    /// Load a user together with a snapshot of their roles. `None` if the user is gone.
    async fn load_current_user(&self, id: UserId) -> Result<Option<CurrentUser>> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(None);
        };
        let roles = self.get_roles_for_user(id).await?;
        Ok(Some(CurrentUser::from_parts(user, roles)))
    }
}

#[async_trait]
impl PrincipalRepository for Database {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Users::new(self).get_by_id(id).await
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<UserDBResponse>> {
        Users::new(self).get_user_by_login(login).await
    }

    async fn get_roles_for_user(&self, id: UserId) -> Result<Vec<RoleDBResponse>> {
        Roles::new(self).get_user_roles(id).await
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        Roles::new(self).get_by_id(id).await
    }

    async fn get_users_for_role(&self, id: RoleId) -> Result<Vec<UserId>> {
        Roles::new(self).get_role_users(id).await
    }
}

/// Who is making a request, as recorded in the request extensions by the
/// auth interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Authenticated(CurrentUser),
    /// No valid session, on an action that allows anonymous access
    Anonymous,
}

impl Caller {
    pub fn user(&self) -> Option<&CurrentUser> {
        match self {
            Caller::Authenticated(user) => Some(user),
            Caller::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{roles::RoleCreateDBRequest, users::UserCreateDBRequest};

    #[tokio::test]
    async fn test_both_membership_views_agree() {
        let db = Database::new();
        let user = Users::new(&db)
            .create(&UserCreateDBRequest {
                login: "alice".to_string(),
                display_name: Some("Alice".to_string()),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let roles = Roles::new(&db);
        let editors = roles
            .create(&RoleCreateDBRequest {
                name: "Editors".to_string(),
                description: None,
            })
            .await
            .unwrap();
        roles.add_user(user.id, editors.id).await.unwrap();

        let repo: &dyn PrincipalRepository = &db;
        assert_eq!(repo.get_users_for_role(editors.id).await.unwrap(), vec![user.id]);
        assert_eq!(repo.get_roles_for_user(user.id).await.unwrap(), vec![editors.clone()]);

        let current = repo.load_current_user(user.id).await.unwrap().unwrap();
        assert_eq!(current.login, "alice");
        assert!(current.has_role("Editors"));
        assert!(!current.has_role("editors"));
        assert!(current.holds_role_id(editors.id));

        roles.remove_user(user.id, editors.id).await.unwrap();
        assert!(repo.get_users_for_role(editors.id).await.unwrap().is_empty());
        let current = repo.load_current_user(user.id).await.unwrap().unwrap();
        assert!(current.roles.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_loads_as_none() {
        let db = Database::new();
        assert!(db.load_current_user(uuid::Uuid::new_v4()).await.unwrap().is_none());
    }
}
