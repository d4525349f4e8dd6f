use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        files::{FileResponse, FileRolesRequest, FileUpdate, FileUsersRequest, ListFilesQuery, SearchFilesQuery, TagsRequest, TagsResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions::{require_file_access, require_owner},
    db::{
        errors::DbError,
        handlers::{
            Files, Repository, Roles, Users,
            files::{FileFilter, normalize_tags},
        },
        models::files::{FileCreateDBRequest, FileDBResponse, FileUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{FileId, IdQuery, abbrev_uuid},
};

fn file_not_found(id: FileId) -> Error {
    Error::NotFound {
        resource: "File".to_string(),
        id: id.to_string(),
    }
}

/// The file disappeared, or the caller lost access, between the access check and the change
fn not_found_as_file(id: FileId) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => file_not_found(id),
        other => other.into(),
    }
}

/// Load a file the caller may access. Files they cannot see look missing.
async fn accessible_file(state: &AppState, user: &CurrentUser, id: FileId) -> Result<FileDBResponse> {
    let file = Files::new(&state.db).get_by_id(id).await?.ok_or_else(|| file_not_found(id))?;
    require_file_access(user, &file)?;
    Ok(file)
}

fn unknown_ids(kind: &str, requested: &[Uuid], found: impl Fn(&Uuid) -> bool) -> Result<()> {
    let mut missing: Vec<String> = requested.iter().filter(|id| !found(id)).map(ToString::to_string).collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    missing.dedup();
    Err(Error::BadRequest {
        message: format!("Unknown {kind} ids: {}", missing.join(", ")),
    })
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    ids.iter().copied().collect::<HashSet<_>>().into_iter().collect()
}

fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_control() || c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[utoipa::path(
    get,
    path = "/file/list",
    tag = "files",
    summary = "List accessible files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Files the caller owns or was granted, ordered by name", body = PaginatedResponse<FileResponse>),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_files(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>> {
    let (skip, limit) = query.pagination.params();
    let files = Files::new(&state.db)
        .list(&FileFilter::new(skip, limit).visible_to(current_user))
        .await?;

    Ok(Json(PaginatedResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/file/upload",
    tag = "files",
    summary = "Upload file",
    description = "Multipart upload with a `file` part and an optional comma-separated `tags` part. The uploader owns the file.",
    request_body(
        content_type = "multipart/form-data",
        description = "`file` (required, with a filename) and `tags` (optional)"
    ),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Missing or malformed file part"),
        (status = 413, description = "File larger than the configured limit"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(owner = %abbrev_uuid(&current_user.id)))]
pub async fn upload_file(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>)> {
    let max_file_size = state.config.files.max_file_size;
    let mut upload = None;
    let mut tags = BTreeSet::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let name = field
                    .file_name()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| Error::BadRequest {
                        message: "The file part must carry a filename".to_string(),
                    })?;
                let declared_type = field.content_type().map(str::to_string);

                let mut content = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read file chunk: {e}"),
                })? {
                    if (content.len() + chunk.len()) as u64 > max_file_size {
                        tracing::warn!(%name, max_file_size, "File size limit exceeded, aborting upload");
                        return Err(Error::PayloadTooLarge {
                            message: format!("File size exceeds maximum allowed size of {max_file_size} bytes"),
                        });
                    }
                    content.extend_from_slice(&chunk);
                }

                let content_type = declared_type
                    .filter(|t| !t.is_empty() && t != "application/octet-stream")
                    .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());
                upload = Some((name, content_type, content.freeze()));
            }
            "tags" => {
                let text = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read tags: {e}"),
                })?;
                tags.extend(normalize_tags(text.split(',')));
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let Some((name, content_type, content)) = upload else {
        return Err(Error::BadRequest {
            message: "Missing file part".to_string(),
        });
    };

    let repo = Files::new(&state.db);
    let file = repo
        .create(&FileCreateDBRequest {
            owner: current_user.id,
            name,
            content_type,
            size: content.len() as u64,
            tags,
        })
        .await?;

    if let Err(e) = state.blobs.put(file.id, content).await {
        repo.delete(file.id).await?;
        return Err(e);
    }

    tracing::info!(file_id = %abbrev_uuid(&file.id), size = file.size, "File uploaded");
    Ok((StatusCode::CREATED, Json(FileResponse::from(file))))
}

#[utoipa::path(
    get,
    path = "/file/retrieve",
    tag = "files",
    summary = "Get file metadata",
    params(IdQuery),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn get_file(State(state): State<AppState>, current_user: CurrentUser, Query(query): Query<IdQuery>) -> Result<Json<FileResponse>> {
    let file = accessible_file(&state, &current_user, query.id).await?;
    Ok(Json(FileResponse::from(file)))
}

#[utoipa::path(
    get,
    path = "/file/download",
    tag = "files",
    summary = "Download file content",
    params(IdQuery),
    responses(
        (status = 200, description = "File content, served with its stored content type"),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn download_file(State(state): State<AppState>, current_user: CurrentUser, Query(query): Query<IdQuery>) -> Result<Response> {
    let file = accessible_file(&state, &current_user, query.id).await?;
    let content = state.blobs.get(file.id).await?.ok_or_else(|| Error::Internal {
        operation: format!("load content for file {}", file.id),
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, content_disposition(&file.name)),
        ],
        content,
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/file/update",
    tag = "files",
    summary = "Rename file",
    params(IdQuery),
    request_body = FileUpdate,
    responses(
        (status = 200, description = "File updated", body = FileResponse),
        (status = 400, description = "Empty name"),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn update_file(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<FileUpdate>,
) -> Result<Json<FileResponse>> {
    accessible_file(&state, &current_user, query.id).await?;

    let name = match request.name {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::BadRequest {
                message: "File name cannot be empty".to_string(),
            });
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .update(query.id, &FileUpdateDBRequest { name })
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(Json(FileResponse::from(file)))
}

#[utoipa::path(
    post,
    path = "/file/delete",
    tag = "files",
    summary = "Delete file",
    params(IdQuery),
    responses(
        (status = 204, description = "File and content deleted"),
        (status = 403, description = "Only the owner may delete a file"),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn delete_file(State(state): State<AppState>, current_user: CurrentUser, Query(query): Query<IdQuery>) -> Result<StatusCode> {
    let file = Files::new(&state.db).get_by_id(query.id).await?.ok_or_else(|| file_not_found(query.id))?;
    require_owner(&current_user, &file, "/file/delete")?;

    if Files::new(&state.db).delete(query.id).await?.is_none() {
        return Err(file_not_found(query.id));
    }
    state.blobs.delete(query.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/file/search",
    tag = "files",
    summary = "Search files by tag",
    params(SearchFilesQuery),
    responses(
        (status = 200, description = "Accessible files matching the tag predicate", body = PaginatedResponse<FileResponse>),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(tags = ?query.tags, mode = ?query.mode))]
pub async fn search_files(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SearchFilesQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>> {
    let (skip, limit) = query.pagination.params();
    let tags = normalize_tags(query.tags.as_deref().unwrap_or("").split(','));
    let filter = FileFilter::new(skip, limit)
        .visible_to(current_user)
        .with_tags(tags, query.mode.unwrap_or_default());

    let files = Files::new(&state.db).list(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/file/users/add",
    tag = "files",
    summary = "Grant users access",
    params(IdQuery),
    request_body = FileUsersRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 400, description = "Unknown user ids"),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id), count = request.user_ids.len()))]
pub async fn add_file_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<FileUsersRequest>,
) -> Result<Json<FileResponse>> {
    accessible_file(&state, &current_user, query.id).await?;

    let found = Users::new(&state.db).get_bulk(dedup(&request.user_ids)).await?;
    unknown_ids("user", &request.user_ids, |id| found.contains_key(id))?;

    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .add_users(query.id, &request.user_ids)
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(Json(FileResponse::from(file)))
}

#[utoipa::path(
    post,
    path = "/file/users/remove",
    tag = "files",
    summary = "Revoke users' access",
    params(IdQuery),
    request_body = FileUsersRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id), count = request.user_ids.len()))]
pub async fn remove_file_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<FileUsersRequest>,
) -> Result<Json<FileResponse>> {
    accessible_file(&state, &current_user, query.id).await?;

    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .remove_users(query.id, &request.user_ids)
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(Json(FileResponse::from(file)))
}

#[utoipa::path(
    post,
    path = "/file/roles/add",
    tag = "files",
    summary = "Grant roles access",
    params(IdQuery),
    request_body = FileRolesRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 400, description = "Unknown role ids"),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id), count = request.role_ids.len()))]
pub async fn add_file_roles(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<FileRolesRequest>,
) -> Result<Json<FileResponse>> {
    accessible_file(&state, &current_user, query.id).await?;

    let found = Roles::new(&state.db).get_bulk(dedup(&request.role_ids)).await?;
    unknown_ids("role", &request.role_ids, |id| found.contains_key(id))?;

    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .add_roles(query.id, &request.role_ids)
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(Json(FileResponse::from(file)))
}

#[utoipa::path(
    post,
    path = "/file/roles/remove",
    tag = "files",
    summary = "Revoke roles' access",
    params(IdQuery),
    request_body = FileRolesRequest,
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id), count = request.role_ids.len()))]
pub async fn remove_file_roles(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<FileRolesRequest>,
) -> Result<Json<FileResponse>> {
    accessible_file(&state, &current_user, query.id).await?;

    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .remove_roles(query.id, &request.role_ids)
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(Json(FileResponse::from(file)))
}

fn tags_response(file: FileDBResponse) -> Json<TagsResponse> {
    Json(TagsResponse {
        id: file.id,
        tags: file.tags.into_iter().collect(),
    })
}

#[utoipa::path(
    get,
    path = "/file/tags",
    tag = "files",
    summary = "Get file tags",
    params(IdQuery),
    responses(
        (status = 200, description = "Tags of the file", body = TagsResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn get_file_tags(State(state): State<AppState>, current_user: CurrentUser, Query(query): Query<IdQuery>) -> Result<Json<TagsResponse>> {
    let file = accessible_file(&state, &current_user, query.id).await?;
    Ok(tags_response(file))
}

#[utoipa::path(
    post,
    path = "/file/tags/add",
    tag = "files",
    summary = "Add tags",
    params(IdQuery),
    request_body = TagsRequest,
    responses(
        (status = 200, description = "Tags after the change", body = TagsResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn add_file_tags(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<TagsRequest>,
) -> Result<Json<TagsResponse>> {
    accessible_file(&state, &current_user, query.id).await?;
    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .add_tags(query.id, normalize_tags(&request.tags))
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(tags_response(file))
}

#[utoipa::path(
    post,
    path = "/file/tags/remove",
    tag = "files",
    summary = "Remove tags",
    params(IdQuery),
    request_body = TagsRequest,
    responses(
        (status = 200, description = "Tags after the change", body = TagsResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn remove_file_tags(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<TagsRequest>,
) -> Result<Json<TagsResponse>> {
    accessible_file(&state, &current_user, query.id).await?;
    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .remove_tags(query.id, normalize_tags(&request.tags))
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(tags_response(file))
}

#[utoipa::path(
    post,
    path = "/file/tags/set",
    tag = "files",
    summary = "Replace tags",
    params(IdQuery),
    request_body = TagsRequest,
    responses(
        (status = 200, description = "Tags after the change", body = TagsResponse),
        (status = 404, description = "File not found or not accessible"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(file_id = %abbrev_uuid(&query.id)))]
pub async fn set_file_tags(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IdQuery>,
    Json(request): Json<TagsRequest>,
) -> Result<Json<TagsResponse>> {
    accessible_file(&state, &current_user, query.id).await?;
    let file = Files::new(&state.db)
        .acting_as(&current_user)
        .set_tags(query.id, normalize_tags(&request.tags))
        .await
        .map_err(not_found_as_file(query.id))?;
    Ok(tags_response(file))
}
