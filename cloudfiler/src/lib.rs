//! # cloudfiler: role-based file sharing service
//!
//! `cloudfiler` stores files for signed-in users and lets them share each
//! file with other users and with roles. Every request passes through an
//! ordered interceptor chain that authenticates the caller and checks the
//! privilege table before the router dispatches to a handler.
//!
//! ## Request Flow
//!
//! 1. [`interceptor::RequestTracing`] tags the request with an id and logs its outcome.
//! 2. [`interceptor::AuthInterceptor`] resolves the session cookie to a user,
//!    loads their roles and looks up the requested path in the privilege
//!    table. Callers without a session are redirected to the login path;
//!    callers missing a required role get `403`.
//! 3. The router dispatches to a handler in [`api::handlers`], which applies
//!    the per-file access rules in [`auth::permissions`].
//!
//! ## Core Components
//!
//! - [`api`]: handlers, request/response models and the [`api::Muxer`] that
//!   routes an action and registers its required roles in one step
//! - [`auth`]: passwords, sessions, the privilege table and the [`auth::authenticator::Authenticator`]
//! - [`db`]: in-memory repositories for users, roles and files
//! - [`interceptor`]: the request chain
//! - [`storage`]: file content
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use cloudfiler::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = cloudfiler::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     cloudfiler::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod interceptor;
mod openapi;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test;

use crate::{
    api::handlers::{auth as auth_handlers, files, index, roles, users},
    auth::{
        authenticator::Authenticator,
        password::{self, Argon2Params},
        session::InMemorySessionStore,
    },
    db::{
        Database,
        handlers::{Repository, Roles, Users},
        models::{
            roles::RoleCreateDBRequest,
            users::{UserCreateDBRequest, UserUpdateDBRequest},
        },
    },
    interceptor::{AuthInterceptor, InterceptorChain, RequestTracing, run_chain},
    storage::{BlobStore, InMemoryBlobStore},
};
use axum::{
    Router, ServiceExt,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

pub use types::{FileId, RoleId, UserId};

/// Headroom on top of `files.max_file_size` for multipart boundaries and the tags part
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(db)
///     .config(config)
///     .authenticator(authenticator)
///     .blobs(Arc::new(InMemoryBlobStore::new()))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub authenticator: Arc<Authenticator>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Make sure the admin role exists and the configured admin account holds it.
///
/// Idempotent. An existing account has its password reset to
/// `admin_password` when one is configured.
#[instrument(skip_all, fields(login = %config.admin_login, role = %config.auth.admin_role))]
pub async fn bootstrap_admin(db: &Database, config: &Config) -> anyhow::Result<UserId> {
    let roles = Roles::new(db);
    let role = match roles.get_by_name(&config.auth.admin_role).await? {
        Some(role) => role,
        None => {
            roles
                .create(&RoleCreateDBRequest {
                    name: config.auth.admin_role.clone(),
                    description: Some("Administrators: manage users and roles".to_string()),
                })
                .await?
        }
    };

    let password_hash = match &config.admin_password {
        Some(admin_password) => Some(password::hash_password_blocking(admin_password.clone(), Argon2Params::from(&config.auth.password)).await?),
        None => None,
    };

    let users = Users::new(db);
    let user = match users.get_user_by_login(&config.admin_login).await? {
        Some(existing) => match password_hash {
            Some(password_hash) => {
                users
                    .update(
                        existing.id,
                        &UserUpdateDBRequest {
                            display_name: None,
                            password_hash: Some(password_hash),
                        },
                    )
                    .await?
            }
            None => existing,
        },
        None => {
            let Some(password_hash) = password_hash else {
                anyhow::bail!("admin_password must be set to create the '{}' account", config.admin_login);
            };
            users
                .create(&UserCreateDBRequest {
                    login: config.admin_login.clone(),
                    display_name: Some("Administrator".to_string()),
                    password_hash,
                })
                .await?
        }
    };

    roles.add_user(user.id, role.id).await?;
    info!("Admin account ready");
    Ok(user.id)
}

/// Build the router, registering each action's required roles as it is routed.
pub fn build_router(state: &AppState) -> Router {
    let admin: &[&str] = &[state.config.auth.admin_role.as_str()];
    let login_path = state.authenticator.login_path().to_string();

    let router = api::Muxer::new(state.authenticator.clone())
        .add_public_action("/healthz", get(index::healthz))
        .add_public_action("/openapi.json", get(openapi::openapi_json))
        .add_public_action(&login_path, get(auth_handlers::get_login_info).post(auth_handlers::login))
        .add_action("/", get(index::index), &[])
        .add_action("/auth/logout", get(auth_handlers::logout).post(auth_handlers::logout), &[])
        // User administration
        .add_action("/user/list", get(users::list_users), admin)
        .add_action("/user/create", post(users::create_user), admin)
        .add_action("/user/retrieve", get(users::get_user), admin)
        .add_action("/user/update", post(users::update_user), admin)
        // Role administration
        .add_action("/role/list", get(roles::list_roles), admin)
        .add_action("/role/create", post(roles::create_role), admin)
        .add_action("/role/retrieve", get(roles::get_role), admin)
        .add_action("/role/update", post(roles::update_role), admin)
        .add_action("/role/delete", post(roles::delete_role), admin)
        .add_action("/role/users/add", post(roles::add_role_users), admin)
        .add_action("/role/users/remove", post(roles::remove_role_users), admin)
        // Files: any signed-in user, file grants are checked by the handlers
        .add_action("/file/list", get(files::list_files), &[])
        .add_action("/file/upload", post(files::upload_file), &[])
        .add_action("/file/retrieve", get(files::get_file), &[])
        .add_action("/file/download", get(files::download_file), &[])
        .add_action("/file/update", post(files::update_file), &[])
        .add_action("/file/delete", post(files::delete_file), &[])
        .add_action("/file/search", get(files::search_files), &[])
        .add_action("/file/users/add", post(files::add_file_users), &[])
        .add_action("/file/users/remove", post(files::remove_file_users), &[])
        .add_action("/file/roles/add", post(files::add_file_roles), &[])
        .add_action("/file/roles/remove", post(files::remove_file_roles), &[])
        .add_action("/file/tags", get(files::get_file_tags), &[])
        .add_action("/file/tags/add", post(files::add_file_tags), &[])
        .add_action("/file/tags/remove", post(files::remove_file_tags), &[])
        .add_action("/file/tags/set", post(files::set_file_tags), &[])
        .into_router()
        .with_state(state.clone());

    let body_limit = usize::try_from(state.config.files.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    router.layer(DefaultBodyLimit::max(body_limit)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// The interceptors every request passes through, outermost first
pub fn build_interceptor_chain(authenticator: Arc<Authenticator>) -> InterceptorChain {
    InterceptorChain::builder()
        .with(RequestTracing)
        .with(AuthInterceptor::new(authenticator))
        .build()
}

/// A ready-to-serve instance: state, router and interceptor chain.
pub struct Application {
    router: Router,
    chain: InterceptorChain,
    app_state: AppState,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting cloudfiler with configuration: {:#?}", config);

        let db = Database::new();
        bootstrap_admin(&db, &config).await?;

        let sessions = Arc::new(InMemorySessionStore::new(config.auth.session.timeout));
        let authenticator = Arc::new(Authenticator::new(Arc::new(db.clone()), sessions, &config.auth));

        let app_state = AppState::builder()
            .db(db)
            .config(config.clone())
            .authenticator(authenticator.clone())
            .blobs(Arc::new(InMemoryBlobStore::new()))
            .build();

        let router = build_router(&app_state);
        let chain = build_interceptor_chain(authenticator);

        Ok(Self {
            router,
            chain,
            app_state,
            config,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> anyhow::Result<axum_test::TestServer> {
        let service = from_fn_with_state(self.chain, run_chain).layer(self.router);
        axum_test::TestServer::new(service.into_make_service())
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("cloudfiler listening on http://{}", bind_addr);

        // The chain runs before path matching so unrouted paths are still authorized
        let service = from_fn_with_state(self.chain, run_chain).layer(self.router);

        axum::serve(listener, service.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
