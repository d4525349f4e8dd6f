use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use std::collections::HashSet;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        roles::{ListRolesQuery, RoleCreate, RoleMembersRequest, RoleResponse, RoleUpdate},
        users::UserResponse,
    },
    db::{
        errors::DbError,
        handlers::{Repository, Roles, Users, roles::RoleFilter},
        models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{IdQuery, RoleId, UserId},
};

fn role_not_found(id: RoleId) -> Error {
    Error::NotFound {
        resource: "Role".to_string(),
        id: id.to_string(),
    }
}

fn not_found_as_role(id: RoleId) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => role_not_found(id),
        other => other.into(),
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Role name cannot be empty".to_string(),
        });
    }
    Ok(name.to_string())
}

/// A role named by a privilege entry cannot be renamed or removed while the entry exists
fn ensure_unreferenced(state: &AppState, role: &RoleDBResponse, verb: &str) -> Result<()> {
    let actions = state.authenticator.privileges().references_role(&role.name);
    if actions.is_empty() {
        return Ok(());
    }
    Err(Error::Conflict {
        message: format!("Cannot {verb} role '{}': required by actions {}", role.name, actions.join(", ")),
    })
}

async fn ensure_users_exist(state: &AppState, user_ids: &[UserId]) -> Result<()> {
    let unique: HashSet<UserId> = user_ids.iter().copied().collect();
    let found = Users::new(&state.db).get_bulk(unique.iter().copied().collect()).await?;
    if found.len() != unique.len() {
        let mut missing: Vec<String> = unique.iter().filter(|id| !found.contains_key(id)).map(ToString::to_string).collect();
        missing.sort();
        return Err(Error::BadRequest {
            message: format!("Unknown user ids: {}", missing.join(", ")),
        });
    }
    Ok(())
}

async fn with_members(state: &AppState, role: RoleDBResponse) -> Result<RoleResponse> {
    let member_ids = Roles::new(&state.db).get_role_users(role.id).await?;
    let users = Users::new(&state.db).get_bulk(member_ids.clone()).await?;
    let mut members: Vec<UserResponse> = member_ids
        .iter()
        .filter_map(|id| users.get(id))
        .map(|user| UserResponse::from(user.clone()))
        .collect();
    members.sort_by(|a, b| a.login.cmp(&b.login));
    Ok(RoleResponse::from(role).with_members(members))
}

#[utoipa::path(
    get,
    path = "/role/list",
    tag = "roles",
    summary = "List roles",
    params(ListRolesQuery),
    responses(
        (status = 200, description = "Page of roles, ordered by name", body = PaginatedResponse<RoleResponse>),
        (status = 403, description = "Caller lacks the admin role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(State(state): State<AppState>, Query(query): Query<ListRolesQuery>) -> Result<Json<PaginatedResponse<RoleResponse>>> {
    let (skip, limit) = query.pagination.params();
    let roles = Roles::new(&state.db).list(&RoleFilter::new(skip, limit)).await?;

    Ok(Json(PaginatedResponse::new(
        roles.into_iter().map(RoleResponse::from).collect(),
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/role/create",
    tag = "roles",
    summary = "Create role",
    request_body = RoleCreate,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Empty name"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 409, description = "A role with this name already exists"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub async fn create_role(State(state): State<AppState>, Json(request): Json<RoleCreate>) -> Result<(StatusCode, Json<RoleResponse>)> {
    let mut db_request = RoleCreateDBRequest::from(request);
    db_request.name = validate_name(&db_request.name)?;

    let role = Roles::new(&state.db).create(&db_request).await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role).with_members(Vec::new()))))
}

#[utoipa::path(
    get,
    path = "/role/retrieve",
    tag = "roles",
    summary = "Get role",
    params(IdQuery),
    responses(
        (status = 200, description = "Role with its members", body = RoleResponse),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "Role not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(role_id = %query.id))]
pub async fn get_role(State(state): State<AppState>, Query(query): Query<IdQuery>) -> Result<Json<RoleResponse>> {
    let role = Roles::new(&state.db).get_by_id(query.id).await?.ok_or_else(|| role_not_found(query.id))?;
    Ok(Json(with_members(&state, role).await?))
}

#[utoipa::path(
    post,
    path = "/role/update",
    tag = "roles",
    summary = "Update role",
    params(IdQuery),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Name taken, or the role is required by an action and cannot be renamed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(role_id = %query.id))]
pub async fn update_role(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(request): Json<RoleUpdate>,
) -> Result<Json<RoleResponse>> {
    let repo = Roles::new(&state.db);
    let existing = repo.get_by_id(query.id).await?.ok_or_else(|| role_not_found(query.id))?;

    let mut db_request = RoleUpdateDBRequest::from(request);
    if let Some(name) = db_request.name.take() {
        let name = validate_name(&name)?;
        if name != existing.name {
            ensure_unreferenced(&state, &existing, "rename")?;
            db_request.name = Some(name);
        }
    }

    let role = repo.update(query.id, &db_request).await.map_err(not_found_as_role(query.id))?;
    Ok(Json(with_members(&state, role).await?))
}

#[utoipa::path(
    post,
    path = "/role/delete",
    tag = "roles",
    summary = "Delete role",
    params(IdQuery),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role is still referenced by files or actions"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(role_id = %query.id))]
pub async fn delete_role(State(state): State<AppState>, Query(query): Query<IdQuery>) -> Result<StatusCode> {
    let repo = Roles::new(&state.db);
    let role = repo.get_by_id(query.id).await?.ok_or_else(|| role_not_found(query.id))?;
    ensure_unreferenced(&state, &role, "delete")?;

    if repo.delete(query.id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(role_not_found(query.id))
    }
}

#[utoipa::path(
    post,
    path = "/role/users/add",
    tag = "roles",
    summary = "Add users to role",
    params(IdQuery),
    request_body = RoleMembersRequest,
    responses(
        (status = 200, description = "Updated role with its members", body = RoleResponse),
        (status = 400, description = "Unknown user ids"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "Role not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(role_id = %query.id, count = request.user_ids.len()))]
pub async fn add_role_users(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(request): Json<RoleMembersRequest>,
) -> Result<Json<RoleResponse>> {
    let repo = Roles::new(&state.db);
    let role = repo.get_by_id(query.id).await?.ok_or_else(|| role_not_found(query.id))?;
    ensure_users_exist(&state, &request.user_ids).await?;

    repo.add_users(query.id, &request.user_ids).await.map_err(not_found_as_role(query.id))?;
    Ok(Json(with_members(&state, role).await?))
}

#[utoipa::path(
    post,
    path = "/role/users/remove",
    tag = "roles",
    summary = "Remove users from role",
    params(IdQuery),
    request_body = RoleMembersRequest,
    responses(
        (status = 200, description = "Updated role with its members", body = RoleResponse),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "Role not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(role_id = %query.id, count = request.user_ids.len()))]
pub async fn remove_role_users(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(request): Json<RoleMembersRequest>,
) -> Result<Json<RoleResponse>> {
    let repo = Roles::new(&state.db);
    let role = repo.get_by_id(query.id).await?.ok_or_else(|| role_not_found(query.id))?;

    repo.remove_users(query.id, &request.user_ids).await.map_err(not_found_as_role(query.id))?;
    Ok(Json(with_members(&state, role).await?))
}
