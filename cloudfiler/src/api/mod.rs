//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all actions
//! - **[`models`]**: Request/response data structures
//! - **[`Muxer`]**: Routes actions and registers their privileges in one step
//!
//! # Actions
//!
//! Every route path is an action identifier. Single-entity actions take the
//! target as an `?id=` query parameter.
//!
//! - **Authentication** (`/auth/*`): Login and logout
//! - **Users** (`/user/*`): Account administration, admin role only
//! - **Roles** (`/role/*`): Role administration, admin role only
//! - **Files** (`/file/*`): Any signed-in user, subject to file grants

pub mod handlers;
pub mod models;

use axum::{Router, routing::MethodRouter};
use std::sync::Arc;
use tracing::debug;

use crate::{AppState, auth::authenticator::Authenticator};

/// Router builder that keeps routes and the privilege table in step.
///
/// A path is registered on the router and in the authenticator's privilege
/// table together, so an action can never be routed with a stale requirement.
pub struct Muxer {
    router: Router<AppState>,
    authenticator: Arc<Authenticator>,
}

impl Muxer {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self {
            router: Router::new(),
            authenticator,
        }
    }

    /// Route `handler` at `path`. A caller must hold at least one of
    /// `required_roles`; an empty list means any signed-in user.
    pub fn add_action(mut self, path: &str, handler: MethodRouter<AppState>, required_roles: &[&str]) -> Self {
        if !required_roles.is_empty() {
            self.authenticator.set_required_privileges(path, required_roles.iter().copied());
        }
        debug!(action = path, ?required_roles, "Registered action");
        self.router = self.router.route(path, handler);
        self
    }

    /// Route `handler` at `path` with no session required.
    pub fn add_public_action(mut self, path: &str, handler: MethodRouter<AppState>) -> Self {
        self.authenticator.allow_anonymous(path);
        debug!(action = path, "Registered public action");
        self.router = self.router.route(path, handler);
        self
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}
