//! Login and logout payloads.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::CurrentUser;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice")]
    pub login: String,
    pub password: String,
}

/// What the login page knows about the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginInfo {
    /// Where to post credentials
    pub login_path: String,
    /// The caller, if they already hold a valid session
    pub user: Option<CurrentUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: CurrentUser,
    pub message: String,
    /// Where the client should go next
    pub redirect_to: String,
}

/// Successful login: the JSON body plus the session cookie
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], Json(self.auth_response)).into_response()
    }
}

/// Logout: clear the cookie and send the browser on
pub struct LogoutResponse {
    pub cookie: String,
    pub redirect_to: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        ([(header::SET_COOKIE, self.cookie)], Redirect::to(&self.redirect_to)).into_response()
    }
}
