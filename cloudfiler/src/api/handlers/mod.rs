//! HTTP request handlers for all actions.
//!
//! Handlers are organized by resource type. By the time a handler runs, the
//! interceptor chain has already authorized the action, so handlers only
//! validate input, apply file-level access rules and call the repositories.
//!
//! # Handler Modules
//!
//! - [`index`]: The current user, and the health check
//! - [`auth`]: Login and logout
//! - [`users`]: User administration
//! - [`roles`]: Role administration and membership
//! - [`files`]: Upload, download, sharing, tags and search
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching
//! HTTP status. A file the caller may not access is reported exactly like a
//! missing one.

pub mod auth;
pub mod files;
pub mod index;
pub mod roles;
pub mod users;
