use axum::Json;

use crate::api::models::users::CurrentUser;

/// Who am I
#[utoipa::path(
    get,
    path = "/",
    tag = "index",
    summary = "Current user",
    responses(
        (status = 200, description = "The signed-in user and their roles", body = CurrentUser),
        (status = 303, description = "No session, redirect to the login page"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn index(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "index",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn healthz() -> &'static str {
    "OK"
}
