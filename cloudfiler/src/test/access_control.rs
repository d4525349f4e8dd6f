use axum::http::{StatusCode, header};
use serde_json::json;

use super::{get, post};
use crate::api::models::{
    auth::AuthResponse,
    pagination::PaginatedResponse,
    roles::RoleResponse,
    users::{CurrentUser, UserResponse},
};
use crate::test_utils::*;

#[test_log::test(tokio::test)]
async fn test_healthz_and_login_page_are_public() {
    let (server, _state) = create_test_app().await;

    server.get("/healthz").await.assert_text("OK");

    let response = server.get("/auth/login").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["login_path"], "/auth/login");
    assert!(body["user"].is_null());
}

#[test_log::test(tokio::test)]
async fn test_anonymous_requests_redirect_to_login() {
    let (server, _state) = create_test_app().await;

    for path in ["/", "/file/list", "/user/list", "/role/delete", "/auth/logout", "/nowhere"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(header::LOCATION), "/auth/login", "{path}");
    }
}

#[test_log::test(tokio::test)]
async fn test_login_sets_session_cookie() {
    let (server, state) = create_test_app().await;
    create_test_user(&state.db, "alice").await;

    let response = server
        .post("/auth/login")
        .json(&json!({ "login": "alice", "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();
    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("cloudfiler_session="));
    assert!(set_cookie.contains("HttpOnly"));

    let body: AuthResponse = response.json();
    assert_eq!(body.user.login, "alice");
    assert_eq!(body.redirect_to, "/");

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let me: CurrentUser = get(&server, "/", &cookie).await.json();
    assert_eq!(me.login, "alice");
    assert!(me.roles.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_bad_credentials_are_indistinguishable() {
    let (server, state) = create_test_app().await;
    create_test_user(&state.db, "alice").await;

    let wrong_password = server
        .post("/auth/login")
        .json(&json!({ "login": "alice", "password": "not-the-password" }))
        .expect_failure()
        .await;
    let unknown_user = server
        .post("/auth/login")
        .json(&json!({ "login": "mallory", "password": TEST_PASSWORD }))
        .expect_failure()
        .await;

    wrong_password.assert_status_unauthorized();
    unknown_user.assert_status_unauthorized();
    assert_eq!(wrong_password.text(), unknown_user.text());
}

#[test_log::test(tokio::test)]
async fn test_logout_is_idempotent() {
    let (server, state) = create_test_app().await;
    create_test_user(&state.db, "alice").await;
    let cookie = login(&server, "alice", TEST_PASSWORD).await;

    let first = post(&server, "/auth/logout", &cookie).await;
    first.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(first.header(header::LOCATION), "/auth/login");
    assert!(first.header(header::SET_COOKIE).to_str().unwrap().contains("Max-Age=0"));

    // The session is gone, so the old cookie behaves like no cookie at all
    get(&server, "/", &cookie).await.assert_status(StatusCode::SEE_OTHER);

    for _ in 0..2 {
        let again = post(&server, "/auth/logout", &cookie).await;
        again.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(again.header(header::LOCATION), "/auth/login");
    }
}

#[test_log::test(tokio::test)]
async fn test_admin_actions_require_admin_role() {
    let (server, state) = create_test_app().await;
    create_test_user(&state.db, "alice").await;
    let alice = login(&server, "alice", TEST_PASSWORD).await;
    let admin = login_admin(&server).await;

    for path in ["/user/list", "/role/list"] {
        get(&server, path, &alice).expect_failure().await.assert_status_forbidden();
        get(&server, path, &admin).await.assert_status_ok();
    }

    // File actions only need a session
    get(&server, "/file/list", &alice).await.assert_status_ok();
}

#[test_log::test(tokio::test)]
async fn test_unregistered_path_is_not_found_once_signed_in() {
    let (server, state) = create_test_app().await;
    create_test_user(&state.db, "alice").await;
    let alice = login(&server, "alice", TEST_PASSWORD).await;

    get(&server, "/nowhere", &alice).expect_failure().await.assert_status_not_found();
}

#[test_log::test(tokio::test)]
async fn test_any_of_roles_regardless_of_order() {
    let (server, state) = create_test_app().await;
    let alice = create_test_user(&state.db, "alice").await;
    let auditors = create_test_role(&state.db, "Auditors").await;
    add_user_to_role(&state.db, &alice, &auditors).await;
    let cookie = login(&server, "alice", TEST_PASSWORD).await;

    state.authenticator.set_required_privileges("/user/list", ["Admin", "Auditors"]);
    get(&server, "/user/list", &cookie).await.assert_status_ok();

    state.authenticator.set_required_privileges("/user/list", ["Auditors", "Admin"]);
    get(&server, "/user/list", &cookie).await.assert_status_ok();

    state.authenticator.set_required_privileges("/user/list", ["Admin"]);
    get(&server, "/user/list", &cookie).expect_failure().await.assert_status_forbidden();
}

#[test_log::test(tokio::test)]
async fn test_role_membership_changes_apply_to_next_request() {
    let (server, state) = create_test_app().await;
    let alice = create_test_user(&state.db, "alice").await;
    let admin = login_admin(&server).await;
    let cookie = login(&server, "alice", TEST_PASSWORD).await;
    let admin_role = crate::db::handlers::Roles::new(&state.db)
        .get_by_name("Admin")
        .await
        .unwrap()
        .unwrap();

    get(&server, "/role/list", &cookie).expect_failure().await.assert_status_forbidden();

    post(&server, &format!("/role/users/add?id={}", admin_role.id), &admin)
        .json(&json!({ "user_ids": [alice.id] }))
        .await
        .assert_status_ok();
    get(&server, "/role/list", &cookie).await.assert_status_ok();

    post(&server, &format!("/role/users/remove?id={}", admin_role.id), &admin)
        .json(&json!({ "user_ids": [alice.id] }))
        .await
        .assert_status_ok();
    get(&server, "/role/list", &cookie).expect_failure().await.assert_status_forbidden();
}

#[test_log::test(tokio::test)]
async fn test_user_administration() {
    let (server, _state) = create_test_app().await;
    let admin = login_admin(&server).await;

    let response = post(&server, "/user/create", &admin)
        .json(&json!({ "login": "bob", "password": "bob-password", "display_name": "Bob" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let bob: UserResponse = response.json();

    post(&server, "/user/create", &admin)
        .json(&json!({ "login": "bob", "password": "another-password" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::CONFLICT);
    post(&server, "/user/create", &admin)
        .json(&json!({ "login": "carol", "password": "short" }))
        .expect_failure()
        .await
        .assert_status_bad_request();

    let bob_cookie = login(&server, "bob", "bob-password").await;
    let me: CurrentUser = get(&server, "/", &bob_cookie).await.json();
    assert_eq!(me.display_name.as_deref(), Some("Bob"));

    post(&server, &format!("/user/update?id={}", bob.id), &admin)
        .json(&json!({ "password": "new-bob-password" }))
        .await
        .assert_status_ok();
    server
        .post("/auth/login")
        .json(&json!({ "login": "bob", "password": "bob-password" }))
        .expect_failure()
        .await
        .assert_status_unauthorized();
    login(&server, "bob", "new-bob-password").await;

    let page: PaginatedResponse<UserResponse> = get(&server, "/user/list", &admin).await.json();
    let logins: Vec<_> = page.data.iter().map(|u| u.login.as_str()).collect();
    assert_eq!(logins, vec!["admin", "bob"]);

    let retrieved: UserResponse = get(&server, &format!("/user/retrieve?id={}", bob.id), &admin).await.json();
    assert_eq!(retrieved.roles, Some(vec![]));
}

#[test_log::test(tokio::test)]
async fn test_role_delete_requires_admin() {
    let (server, state) = create_test_app().await;
    let alice_user = create_test_user(&state.db, "alice").await;
    let alice = login(&server, "alice", TEST_PASSWORD).await;
    let admin = login_admin(&server).await;
    let admin_role = crate::db::handlers::Roles::new(&state.db)
        .get_by_name("Admin")
        .await
        .unwrap()
        .unwrap();

    let response = post(&server, "/role/create", &admin)
        .json(&json!({ "name": "Editors", "description": "Edit things" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let editors: RoleResponse = response.json();

    // No roles yet
    post(&server, &format!("/role/delete?id={}", editors.id), &alice)
        .expect_failure()
        .await
        .assert_status_forbidden();
    get(&server, &format!("/role/retrieve?id={}", editors.id), &admin).await.assert_status_ok();

    post(&server, &format!("/role/users/add?id={}", admin_role.id), &admin)
        .json(&json!({ "user_ids": [alice_user.id] }))
        .await
        .assert_status_ok();

    // Same session, now holding Admin
    post(&server, &format!("/role/delete?id={}", editors.id), &alice)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    get(&server, &format!("/role/retrieve?id={}", editors.id), &admin)
        .expect_failure()
        .await
        .assert_status_not_found();
}

#[test_log::test(tokio::test)]
async fn test_role_required_by_actions_cannot_be_deleted_or_renamed() {
    let (server, state) = create_test_app().await;
    let admin = login_admin(&server).await;
    let admin_role = crate::db::handlers::Roles::new(&state.db)
        .get_by_name("Admin")
        .await
        .unwrap()
        .unwrap();

    let response = post(&server, &format!("/role/delete?id={}", admin_role.id), &admin)
        .expect_failure()
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("/role/delete"));

    post(&server, &format!("/role/update?id={}", admin_role.id), &admin)
        .json(&json!({ "name": "Admins" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::CONFLICT);

    // Description changes are fine
    let updated: RoleResponse = post(&server, &format!("/role/update?id={}", admin_role.id), &admin)
        .json(&json!({ "description": "Root" }))
        .await
        .json();
    assert_eq!(updated.name, "Admin");
    assert_eq!(updated.description.as_deref(), Some("Root"));
}
