//! Login, logout and per-action authorization.
//!
//! The [`Authenticator`] is built once at startup and shared through
//! [`crate::AppState`] and the auth interceptor. It owns the privilege table;
//! routes register their required roles on it while the router is built.

use axum::http::{HeaderMap, header};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::{
    password,
    principal::{Caller, PrincipalRepository},
    privileges::{PrivilegeTable, Requirement},
    session::{Session, SessionStore},
};
use crate::config::{AuthConfig, SessionConfig};
use crate::errors::{Error, Result};
use crate::types::{UserId, abbrev_uuid};

/// Login form
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Why an action was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No valid session, or the session's user no longer exists
    Unauthenticated,
    /// Authenticated, but holding none of the listed roles
    MissingRole { required: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed(Caller),
    Denied(Denial),
}

pub struct Authenticator {
    principals: Arc<dyn PrincipalRepository>,
    sessions: Arc<dyn SessionStore>,
    privileges: PrivilegeTable,
    login_path: String,
    post_login_redirect: String,
    post_logout_redirect: String,
    cookie: SessionConfig,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("login_path", &self.login_path)
            .field("privileges", &self.privileges)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// The login path is public from the start, otherwise nobody could log in.
    pub fn new(principals: Arc<dyn PrincipalRepository>, sessions: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        let authenticator = Self {
            principals,
            sessions,
            privileges: PrivilegeTable::new(),
            login_path: config.login_path.clone(),
            post_login_redirect: config.post_login_redirect.clone(),
            post_logout_redirect: config.post_logout_redirect.clone(),
            cookie: config.session.clone(),
        };
        authenticator.allow_anonymous(config.login_path.clone());
        authenticator
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn post_login_redirect(&self) -> &str {
        &self.post_login_redirect
    }

    pub fn post_logout_redirect(&self) -> &str {
        &self.post_logout_redirect
    }

    pub fn privileges(&self) -> &PrivilegeTable {
        &self.privileges
    }

    /// Check credentials and open a session.
    ///
    /// Unknown logins and wrong passwords fail the same way.
    #[instrument(skip_all, fields(login = %credentials.login), err)]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let Some(user) = self.principals.get_user_by_login(&credentials.login).await? else {
            debug!("Login for unknown user");
            return Err(Error::InvalidCredentials);
        };

        let valid = password::verify_password_blocking(credentials.password.clone(), user.password_hash.clone()).await?;
        if !valid {
            debug!(user_id = %abbrev_uuid(&user.id), "Wrong password");
            return Err(Error::InvalidCredentials);
        }

        self.sessions.create(user.id).await
    }

    /// Invalidate a session. Unknown or already invalidated tokens are fine.
    #[instrument(skip_all, err)]
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.invalidate(token).await
    }

    /// The session token from the request cookie, if any
    pub fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
        cookie_str.split(';').find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == self.cookie.cookie_name && !value.is_empty()).then(|| value.to_string())
        })
    }

    /// Resolve the caller's session to a user id
    pub async fn current_principal(&self, headers: &HeaderMap) -> Result<Option<UserId>> {
        match self.session_token(headers) {
            Some(token) => self.sessions.resolve(&token).await,
            None => Ok(None),
        }
    }

    /// Require any one of `roles` for `action`, replacing a previous entry
    pub fn set_required_privileges<I, S>(&self, action: impl Into<String>, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.privileges.register(action, Requirement::any_role(roles));
    }

    /// Let callers without a session perform `action`
    pub fn allow_anonymous(&self, action: impl Into<String>) {
        self.privileges.register(action, Requirement::Public);
    }

    /// Decide whether `principal` may perform `action`.
    ///
    /// Roles are read fresh on every call, so membership changes apply to the
    /// next request.
    #[instrument(skip(self), fields(principal = ?principal.as_ref().map(abbrev_uuid)), err)]
    pub async fn authorize(&self, principal: Option<UserId>, action: &str) -> Result<Authorization> {
        let requirement = self.privileges.requirement_for(action);

        let user = match principal {
            Some(id) => self.principals.load_current_user(id).await?,
            None => None,
        };

        let decision = match (requirement, user) {
            (Requirement::Public, Some(user)) => Authorization::Allowed(Caller::Authenticated(user)),
            (Requirement::Public, None) => Authorization::Allowed(Caller::Anonymous),
            (_, None) => Authorization::Denied(Denial::Unauthenticated),
            (Requirement::Authenticated, Some(user)) => Authorization::Allowed(Caller::Authenticated(user)),
            (Requirement::AnyRole(required), Some(user)) => {
                if required.iter().any(|role| user.has_role(role)) {
                    Authorization::Allowed(Caller::Authenticated(user))
                } else {
                    Authorization::Denied(Denial::MissingRole {
                        required: required.into_iter().collect(),
                    })
                }
            }
        };
        Ok(decision)
    }

    /// `Set-Cookie` value carrying a new session
    pub fn session_cookie(&self, session: &Session) -> String {
        self.cookie_with(&session.token, self.cookie.timeout.as_secs())
    }

    /// `Set-Cookie` value that makes the browser drop the session
    pub fn clear_session_cookie(&self) -> String {
        self.cookie_with("", 0)
    }

    fn cookie_with(&self, value: &str, max_age: u64) -> String {
        let secure = if self.cookie.cookie_secure { "; Secure" } else { "" };
        format!(
            "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}{}",
            self.cookie.cookie_name, value, self.cookie.cookie_same_site, max_age, secure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{Argon2Params, hash_password};
    use crate::auth::session::InMemorySessionStore;
    use crate::db::{
        Database,
        handlers::{Repository, Roles, Users},
        models::{roles::RoleCreateDBRequest, users::UserCreateDBRequest},
    };
    use axum::http::HeaderValue;
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        db: Database,
        sessions: Arc<InMemorySessionStore>,
        auth: Authenticator,
    }

    fn fixture() -> Fixture {
        let db = Database::new();
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
        let auth = Authenticator::new(Arc::new(db.clone()), sessions.clone(), &AuthConfig::default());
        Fixture { db, sessions, auth }
    }

    async fn create_user(db: &Database, login: &str, password: &str) -> UserId {
        let params = Argon2Params {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        };
        Users::new(db)
            .create(&UserCreateDBRequest {
                login: login.to_string(),
                display_name: None,
                password_hash: hash_password(password, params).unwrap(),
            })
            .await
            .unwrap()
            .id
    }

    async fn create_role(db: &Database, name: &str) -> Uuid {
        Roles::new(db)
            .create(&RoleCreateDBRequest {
                name: name.to_string(),
                description: None,
            })
            .await
            .unwrap()
            .id
    }

    fn cookie_headers(auth: &Authenticator, token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("other=1; {}={}", auth.cookie.cookie_name, token);
        headers.insert(header::COOKIE, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_login_and_resolve_session() {
        let f = fixture();
        let user_id = create_user(&f.db, "alice", "correct horse").await;

        let session = f
            .auth
            .login(&Credentials {
                login: "alice".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);

        let headers = cookie_headers(&f.auth, &session.token);
        assert_eq!(f.auth.current_principal(&headers).await.unwrap(), Some(user_id));
        assert_eq!(f.auth.current_principal(&HeaderMap::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let f = fixture();
        create_user(&f.db, "alice", "correct horse").await;

        let wrong_password = f
            .auth
            .login(&Credentials {
                login: "alice".to_string(),
                password: "battery staple".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_login = f
            .auth
            .login(&Credentials {
                login: "mallory".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, Error::InvalidCredentials));
        assert!(matches!(unknown_login, Error::InvalidCredentials));
        assert_eq!(wrong_password.user_message(), unknown_login.user_message());
        assert!(f.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let f = fixture();
        let user_id = create_user(&f.db, "alice", "pw").await;
        let session = f.sessions.create(user_id).await.unwrap();
        let headers = cookie_headers(&f.auth, &session.token);

        f.auth.logout(&session.token).await.unwrap();
        assert_eq!(f.auth.current_principal(&headers).await.unwrap(), None);
        f.auth.logout(&session.token).await.unwrap();
        f.auth.logout("garbage").await.unwrap();
    }

    #[tokio::test]
    async fn test_default_policy_is_authenticated_only() {
        let f = fixture();
        let user_id = create_user(&f.db, "alice", "pw").await;

        assert_eq!(
            f.auth.authorize(None, "/file/list").await.unwrap(),
            Authorization::Denied(Denial::Unauthenticated)
        );
        assert!(matches!(
            f.auth.authorize(Some(user_id), "/file/list").await.unwrap(),
            Authorization::Allowed(Caller::Authenticated(user)) if user.id == user_id
        ));
    }

    #[tokio::test]
    async fn test_login_path_is_public() {
        let f = fixture();
        let user_id = create_user(&f.db, "alice", "pw").await;

        assert_eq!(
            f.auth.authorize(None, "/auth/login").await.unwrap(),
            Authorization::Allowed(Caller::Anonymous)
        );
        // A caller with a session is still identified on public actions
        assert!(matches!(
            f.auth.authorize(Some(user_id), "/auth/login").await.unwrap(),
            Authorization::Allowed(Caller::Authenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_any_of_policy_independent_of_assignment_order() {
        let f = fixture();
        let admin = create_role(&f.db, "Admin").await;
        let ops = create_role(&f.db, "Ops").await;
        let roles = Roles::new(&f.db);

        let first = create_user(&f.db, "first", "pw").await;
        roles.add_user(first, admin).await.unwrap();
        roles.add_user(first, ops).await.unwrap();

        let second = create_user(&f.db, "second", "pw").await;
        roles.add_user(second, ops).await.unwrap();
        roles.add_user(second, admin).await.unwrap();

        let only_ops = create_user(&f.db, "only-ops", "pw").await;
        roles.add_user(only_ops, ops).await.unwrap();

        let nobody = create_user(&f.db, "nobody", "pw").await;

        f.auth.set_required_privileges("/role/delete", ["Admin"]);
        f.auth.set_required_privileges("/role/list", ["Admin", "Ops"]);

        for user in [first, second] {
            for action in ["/role/delete", "/role/list"] {
                assert!(matches!(f.auth.authorize(Some(user), action).await.unwrap(), Authorization::Allowed(_)));
            }
        }
        assert!(matches!(
            f.auth.authorize(Some(only_ops), "/role/list").await.unwrap(),
            Authorization::Allowed(_)
        ));
        assert_eq!(
            f.auth.authorize(Some(only_ops), "/role/delete").await.unwrap(),
            Authorization::Denied(Denial::MissingRole {
                required: vec!["Admin".to_string()]
            })
        );
        assert!(matches!(
            f.auth.authorize(Some(nobody), "/role/list").await.unwrap(),
            Authorization::Denied(Denial::MissingRole { .. })
        ));
    }

    #[tokio::test]
    async fn test_role_changes_apply_to_next_call() {
        let f = fixture();
        let admin = create_role(&f.db, "Admin").await;
        let user = create_user(&f.db, "alice", "pw").await;
        f.auth.set_required_privileges("/user/list", ["Admin"]);

        assert!(matches!(f.auth.authorize(Some(user), "/user/list").await.unwrap(), Authorization::Denied(_)));
        Roles::new(&f.db).add_user(user, admin).await.unwrap();
        assert!(matches!(f.auth.authorize(Some(user), "/user/list").await.unwrap(), Authorization::Allowed(_)));
        Roles::new(&f.db).remove_user(user, admin).await.unwrap();
        assert!(matches!(f.auth.authorize(Some(user), "/user/list").await.unwrap(), Authorization::Denied(_)));
    }

    #[tokio::test]
    async fn test_session_for_vanished_user_is_unauthenticated() {
        let f = fixture();
        assert_eq!(
            f.auth.authorize(Some(Uuid::new_v4()), "/file/list").await.unwrap(),
            Authorization::Denied(Denial::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_empty_role_set_denies_everyone() {
        let f = fixture();
        let user = create_user(&f.db, "alice", "pw").await;
        f.auth.set_required_privileges("/locked", Vec::<String>::new());

        assert_eq!(
            f.auth.authorize(Some(user), "/locked").await.unwrap(),
            Authorization::Denied(Denial::MissingRole { required: vec![] })
        );
    }

    #[test]
    fn test_cookie_formatting() {
        let f = fixture();
        let session = Session {
            token: "abc".to_string(),
            user_id: Uuid::new_v4(),
            expires_at: chrono::Utc::now(),
        };
        let cookie = f.auth.session_cookie(&session);
        assert!(cookie.starts_with("cloudfiler_session=abc; Path=/; HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));

        let cleared = f.auth.clear_session_cookie();
        assert!(cleared.starts_with("cloudfiler_session=; "));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_parsing() {
        let f = fixture();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=b; cloudfiler_session=tok123 ; c=d"));
        assert_eq!(f.auth.session_token(&headers), Some("tok123".to_string()));

        headers.insert(header::COOKIE, HeaderValue::from_static("cloudfiler_session="));
        assert_eq!(f.auth.session_token(&headers), None);
    }
}
