//! Database record models.
//!
//! These structs are what the repositories in [`crate::db::handlers`] accept and
//! return. They are kept separate from the API models in [`crate::api::models`]
//! so storage and wire representations can evolve independently; conversions
//! to API responses are `From` impls on the API side.
//!
//! - [`users`]: User accounts and credentials
//! - [`roles`]: Roles (membership lives in a separate relation)
//! - [`files`]: Shared files with their owner, tags and grants

pub mod files;
pub mod roles;
pub mod users;
