//! Per-file access checks.
//!
//! A principal may act on a file if they own it, are listed in its permitted
//! users, or hold any of its permitted roles. Only the owner may delete it.
//!
//! Handlers report a failed access check as the same `404` a missing file
//! gets, so callers cannot discover files they were never shown.

use crate::api::models::users::CurrentUser;
use crate::db::models::files::FileDBResponse;
use crate::errors::Error;
use crate::types::RoleId;

/// Which rule granted access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Owner,
    PermittedUser,
    PermittedRole(RoleId),
}

pub fn file_access(user: &CurrentUser, file: &FileDBResponse) -> Option<FileAccess> {
    if file.owner == user.id {
        return Some(FileAccess::Owner);
    }
    if file.permitted_users.contains(&user.id) {
        return Some(FileAccess::PermittedUser);
    }
    user.roles
        .iter()
        .find(|role| file.permitted_roles.contains(&role.id))
        .map(|role| FileAccess::PermittedRole(role.id))
}

pub fn can_access_file(user: &CurrentUser, file: &FileDBResponse) -> bool {
    file_access(user, file).is_some()
}

pub fn is_owner(user: &CurrentUser, file: &FileDBResponse) -> bool {
    file.owner == user.id
}

fn not_found(file: &FileDBResponse) -> Error {
    Error::NotFound {
        resource: "File".to_string(),
        id: file.id.to_string(),
    }
}

/// Fail with `NotFound` unless the user may access the file
pub fn require_file_access(user: &CurrentUser, file: &FileDBResponse) -> Result<FileAccess, Error> {
    file_access(user, file).ok_or_else(|| not_found(file))
}

/// Fail unless the user owns the file. Non-owners who can see the file get
/// `Forbidden`; everyone else gets `NotFound`.
pub fn require_owner(user: &CurrentUser, file: &FileDBResponse, action: &str) -> Result<(), Error> {
    match require_file_access(user, file)? {
        FileAccess::Owner => Ok(()),
        _ => Err(Error::Forbidden {
            action: action.to_string(),
            required: vec!["owner".to_string()],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::RoleSummary;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn user(roles: &[RoleId]) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            login: "someone".to_string(),
            display_name: None,
            roles: roles
                .iter()
                .map(|id| RoleSummary {
                    id: *id,
                    name: format!("role-{id}"),
                })
                .collect(),
        }
    }

    fn file(owner: &CurrentUser) -> FileDBResponse {
        FileDBResponse {
            id: Uuid::new_v4(),
            owner: owner.id,
            name: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            size: 0,
            tags: BTreeSet::new(),
            permitted_users: BTreeSet::new(),
            permitted_roles: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_always_has_access() {
        let owner = user(&[]);
        let f = file(&owner);
        assert_eq!(file_access(&owner, &f), Some(FileAccess::Owner));
        assert!(is_owner(&owner, &f));
        assert!(require_owner(&owner, &f, "/file/delete").is_ok());
    }

    #[test]
    fn test_stranger_gets_not_found() {
        let owner = user(&[]);
        let stranger = user(&[]);
        let f = file(&owner);

        assert!(!can_access_file(&stranger, &f));
        assert!(matches!(require_file_access(&stranger, &f), Err(Error::NotFound { .. })));
        assert!(matches!(require_owner(&stranger, &f, "/file/delete"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_permitted_user_and_role() {
        let owner = user(&[]);
        let role = Uuid::new_v4();
        let friend = user(&[]);
        let member = user(&[Uuid::new_v4(), role]);
        let mut f = file(&owner);
        f.permitted_users.insert(friend.id);
        f.permitted_roles.insert(role);

        assert_eq!(file_access(&friend, &f), Some(FileAccess::PermittedUser));
        assert_eq!(file_access(&member, &f), Some(FileAccess::PermittedRole(role)));
        assert!(matches!(require_owner(&friend, &f, "/file/delete"), Err(Error::Forbidden { .. })));

        f.permitted_roles.clear();
        assert!(!can_access_file(&member, &f));
    }
}
