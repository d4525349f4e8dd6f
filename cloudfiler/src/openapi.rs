//! OpenAPI document for every action, served at `/openapi.json`.

use axum::Json;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Session cookie set by `/auth/login`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "cloudfiler_session",
                    "Session cookie issued by `POST /auth/login`. The name is configurable via `auth.session.cookie_name`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "cloudfiler", description = "Role-based file sharing service"),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::index::index,
        api::handlers::index::healthz,
        api::handlers::auth::get_login_info,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::roles::list_roles,
        api::handlers::roles::create_role,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::roles::add_role_users,
        api::handlers::roles::remove_role_users,
        api::handlers::files::list_files,
        api::handlers::files::upload_file,
        api::handlers::files::get_file,
        api::handlers::files::download_file,
        api::handlers::files::update_file,
        api::handlers::files::delete_file,
        api::handlers::files::search_files,
        api::handlers::files::add_file_users,
        api::handlers::files::remove_file_users,
        api::handlers::files::add_file_roles,
        api::handlers::files::remove_file_roles,
        api::handlers::files::get_file_tags,
        api::handlers::files::add_file_tags,
        api::handlers::files::remove_file_tags,
        api::handlers::files::set_file_tags,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::LoginInfo,
            api::models::auth::AuthResponse,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::RoleSummary,
            api::models::users::CurrentUser,
            api::models::roles::RoleCreate,
            api::models::roles::RoleUpdate,
            api::models::roles::RoleMembersRequest,
            api::models::roles::RoleResponse,
            api::models::files::FileResponse,
            api::models::files::FileUpdate,
            api::models::files::FileUsersRequest,
            api::models::files::FileRolesRequest,
            api::models::files::TagsRequest,
            api::models::files::TagsResponse,
            crate::db::handlers::files::TagMatch,
        )
    ),
    tags(
        (name = "index", description = "Current user and health"),
        (name = "authentication", description = "Login and logout"),
        (name = "users", description = "User administration (admin role)"),
        (name = "roles", description = "Role administration (admin role)"),
        (name = "files", description = "Upload, share, tag and search files"),
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "index",
    responses((status = 200, description = "This document"))
)]
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
