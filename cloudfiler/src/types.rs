//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`RoleId`]: Role identifier
//! - [`FileId`]: Shared file identifier
//!
//! Action identifiers are plain route paths (see [`crate::auth::privileges`]).

use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type RoleId = Uuid;
pub type FileId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// The `?id=` query parameter carried by every action that targets a single entity.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
