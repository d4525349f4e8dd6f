//! API request and response data models.
//!
//! These structures define the public API contract. They are kept separate
//! from the stored records in [`crate::db::models`] so the two can evolve
//! independently, and are annotated with `utoipa` for the OpenAPI document.
//!
//! - [`auth`]: Login and logout payloads
//! - [`users`]: User accounts and the per-request [`users::CurrentUser`]
//! - [`roles`]: Roles and membership changes
//! - [`files`]: File metadata, grants, tags and search
//! - [`pagination`]: Shared `skip`/`limit` parameters

pub mod auth;
pub mod files;
pub mod pagination;
pub mod roles;
pub mod users;
