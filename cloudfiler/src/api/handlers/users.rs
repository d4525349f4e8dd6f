use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{ListUsersQuery, RoleSummary, UserCreate, UserResponse, UserUpdate},
    },
    auth::password::{self, Argon2Params},
    db::{
        errors::DbError,
        handlers::{Repository, Roles, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{IdQuery, UserId},
};

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

async fn with_roles(state: &AppState, user: UserResponse) -> Result<UserResponse> {
    let roles = Roles::new(&state.db).get_user_roles(user.id).await?;
    Ok(user.with_roles(roles.into_iter().map(RoleSummary::from).collect()))
}

#[utoipa::path(
    get,
    path = "/user/list",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users, ordered by login", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Caller lacks the admin role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, Query(query): Query<ListUsersQuery>) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();
    let users = Users::new(&state.db).list(&UserFilter::new(skip, limit)).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/user/create",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid login or password"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 409, description = "Login already taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(login = %request.login))]
pub async fn create_user(State(state): State<AppState>, Json(request): Json<UserCreate>) -> Result<(StatusCode, Json<UserResponse>)> {
    let login = request.login.trim().to_string();
    if login.is_empty() {
        return Err(Error::BadRequest {
            message: "Login cannot be empty".to_string(),
        });
    }

    password::validate_password(&request.password, &state.config.auth.password)?;
    let password_hash = password::hash_password_blocking(request.password, Argon2Params::from(&state.config.auth.password)).await?;

    let user = Users::new(&state.db)
        .create(&UserCreateDBRequest {
            login,
            display_name: request.display_name,
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user).with_roles(Vec::new()))))
}

#[utoipa::path(
    get,
    path = "/user/retrieve",
    tag = "users",
    summary = "Get user",
    params(IdQuery),
    responses(
        (status = 200, description = "User with their roles", body = UserResponse),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "User not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %query.id))]
pub async fn get_user(State(state): State<AppState>, Query(query): Query<IdQuery>) -> Result<Json<UserResponse>> {
    let user = Users::new(&state.db).get_by_id(query.id).await?.ok_or_else(|| user_not_found(query.id))?;
    Ok(Json(with_roles(&state, UserResponse::from(user)).await?))
}

#[utoipa::path(
    post,
    path = "/user/update",
    tag = "users",
    summary = "Update user",
    params(IdQuery),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid password"),
        (status = 403, description = "Caller lacks the admin role"),
        (status = 404, description = "User not found"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %query.id))]
pub async fn update_user(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(mut request): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    let password_hash = match request.password.take() {
        Some(new_password) => {
            password::validate_password(&new_password, &state.config.auth.password)?;
            Some(password::hash_password_blocking(new_password, Argon2Params::from(&state.config.auth.password)).await?)
        }
        None => None,
    };

    let user = Users::new(&state.db)
        .update(query.id, &UserUpdateDBRequest::new(request, password_hash))
        .await
        .map_err(|e| match e {
            DbError::NotFound => user_not_found(query.id),
            other => other.into(),
        })?;

    Ok(Json(with_roles(&state, UserResponse::from(user)).await?))
}
