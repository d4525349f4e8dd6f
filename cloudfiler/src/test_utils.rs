//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState, Application,
    auth::password::{Argon2Params, hash_password},
    config::{Config, PasswordConfig, SessionConfig},
    db::{
        Database,
        handlers::{Repository, Roles, Users},
        models::{
            roles::{RoleCreateDBRequest, RoleDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
};
use axum::http::{StatusCode, header};
use axum_test::TestServer;
use serde_json::json;

pub const TEST_ADMIN_LOGIN: &str = "admin";
pub const TEST_ADMIN_PASSWORD: &str = "admin-password";
/// Password given to every user made by [`create_test_user`]
pub const TEST_PASSWORD: &str = "correct-horse";

/// Cheap Argon2 parameters so tests don't spend their time hashing
pub fn fast_argon2() -> Argon2Params {
    Argon2Params {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_login: TEST_ADMIN_LOGIN.to_string(),
        admin_password: Some(TEST_ADMIN_PASSWORD.to_string()),
        ..Default::default()
    };
    config.auth.session = SessionConfig {
        cookie_secure: false,
        ..Default::default()
    };
    let fast = fast_argon2();
    config.auth.password = PasswordConfig {
        argon2_memory_kib: fast.memory_kib,
        argon2_iterations: fast.iterations,
        argon2_parallelism: fast.parallelism,
        ..Default::default()
    };
    config.files.max_file_size = 1024 * 1024;
    config
}

/// Fully wired state (admin bootstrapped, no routes registered)
pub async fn create_test_state() -> AppState {
    Application::new(create_test_config())
        .await
        .expect("Failed to create application")
        .state()
        .clone()
}

/// A server over the real router and interceptor chain, plus its state for seeding
pub async fn create_test_app() -> (TestServer, AppState) {
    create_test_app_with_config(create_test_config()).await
}

pub async fn create_test_app_with_config(config: Config) -> (TestServer, AppState) {
    let app = Application::new(config).await.expect("Failed to create application");
    let state = app.state().clone();
    let server = app.into_test_server().expect("Failed to create test server");
    (server, state)
}

pub async fn create_test_user(db: &Database, login: &str) -> UserDBResponse {
    Users::new(db)
        .create(&UserCreateDBRequest {
            login: login.to_string(),
            display_name: None,
            password_hash: hash_password(TEST_PASSWORD, fast_argon2()).expect("Failed to hash password"),
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_role(db: &Database, name: &str) -> RoleDBResponse {
    Roles::new(db)
        .create(&RoleCreateDBRequest {
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("Failed to create test role")
}

pub async fn add_user_to_role(db: &Database, user: &UserDBResponse, role: &RoleDBResponse) {
    Roles::new(db).add_user(user.id, role.id).await.expect("Failed to add user to role");
}

/// Log in through `/auth/login` and return a `Cookie` header value for later requests
pub async fn login(server: &TestServer, login: &str, password: &str) -> String {
    let response = server
        .post("/auth/login")
        .json(&json!({ "login": login, "password": password }))
        .await;
    response.assert_status(StatusCode::OK);

    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().expect("Set-Cookie is not ASCII");
    set_cookie
        .split(';')
        .next()
        .expect("Set-Cookie has no name=value pair")
        .trim()
        .to_string()
}

pub async fn login_admin(server: &TestServer) -> String {
    login(server, TEST_ADMIN_LOGIN, TEST_ADMIN_PASSWORD).await
}
