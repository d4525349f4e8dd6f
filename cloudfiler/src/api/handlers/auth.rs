use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    AppState,
    api::models::auth::{AuthResponse, LoginInfo, LoginRequest, LoginResponse, LogoutResponse},
    auth::{authenticator::Credentials, principal::Caller, principal::PrincipalRepository},
    errors::{Error, Result},
};

/// Get login information
#[utoipa::path(
    get,
    path = "/auth/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Login info, including the caller if already signed in", body = LoginInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_login_info(State(state): State<AppState>, caller: Caller) -> Json<LoginInfo> {
    Json(LoginInfo {
        login_path: state.authenticator.login_path().to_string(),
        user: caller.user().cloned(),
    })
}

/// Log in with login and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthResponse),
        (status = 401, description = "Invalid login or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse> {
    let credentials = Credentials {
        login: request.login,
        password: request.password,
    };
    let session = state.authenticator.login(&credentials).await?;

    // The account could be deleted between the password check and here
    let user = state.db.load_current_user(session.user_id).await?.ok_or(Error::InvalidCredentials)?;

    Ok(LoginResponse {
        auth_response: AuthResponse {
            user,
            message: "Login successful".to_string(),
            redirect_to: state.authenticator.post_login_redirect().to_string(),
        },
        cookie: state.authenticator.session_cookie(&session),
    })
}

/// Log out, ending the current session if there is one
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    responses(
        (status = 303, description = "Session ended, cookie cleared, redirect to the post-logout page"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<LogoutResponse> {
    if let Some(token) = state.authenticator.session_token(&headers) {
        state.authenticator.logout(&token).await?;
    }

    Ok(LogoutResponse {
        cookie: state.authenticator.clear_session_cookie(),
        redirect_to: state.authenticator.post_logout_redirect().to_string(),
    })
}
