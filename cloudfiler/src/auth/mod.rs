//! Authentication and authorization.
//!
//! # Authentication
//!
//! Users log in at the configured login path (`/auth/login` by default) with
//! a login and password. Passwords are stored as Argon2id hashes. A successful
//! login opens a session: an opaque random token stored server-side and handed
//! to the browser in an HTTP-only cookie. Logging out forgets the token.
//!
//! # Authorization
//!
//! Every action is a route path. The [`privileges::PrivilegeTable`] maps
//! actions to the roles allowed to perform them:
//!
//! - no entry: any authenticated user
//! - `Public`: anyone, session or not
//! - `AnyRole(roles)`: an authenticated user holding at least one of `roles`
//!
//! The [`authenticator::Authenticator`] makes this decision for every request
//! from inside the interceptor chain (see [`crate::interceptor`]), before the
//! router dispatches to a handler. Per-file checks (owner, permitted users,
//! permitted roles) happen in handlers through [`permissions`].
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use cloudfiler::api::models::users::CurrentUser;
//!
//! async fn handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.login)
//! }
//! ```

pub mod authenticator;
pub mod current_user;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod privileges;
pub mod session;
