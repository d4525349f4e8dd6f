//! Repository implementations for data access.
//!
//! Each repository borrows the shared [`crate::db::Database`] and implements
//! the [`Repository`] trait for its entity. Entity-specific operations (role
//! membership, file grants and tags, reference-checked deletes) live on the
//! concrete structs.
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts and login lookup
//! - [`Roles`]: Role definitions and user memberships
//! - [`Files`]: File records, access grants, tags and search
//!
//! ```ignore
//! use cloudfiler::db::handlers::{Files, Repository, files::FileFilter};
//!
//! let visible = Files::new(&db).list(&FileFilter::new(0, 100).visible_to(current_user)).await?;
//! ```

pub mod files;
pub mod repository;
pub mod roles;
pub mod users;

pub use files::Files;
pub use repository::Repository;
pub use roles::Roles;
pub use users::Users;
