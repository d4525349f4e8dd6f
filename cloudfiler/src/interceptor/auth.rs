//! Authentication and privilege check for every request.

use async_trait::async_trait;
use axum::{
    extract::Request,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{Interceptor, Next};
use crate::auth::authenticator::{Authenticator, Authorization, Denial};
use crate::errors::Error;

/// Resolves the caller's session and checks the privilege table for the
/// requested path.
///
/// - no valid session on a non-public path: `303` to the login path
/// - valid session without a required role: `403`
/// - otherwise the caller is stored in the request extensions (as
///   [`crate::auth::principal::Caller`]) and the request continues
pub struct AuthInterceptor {
    authenticator: Arc<Authenticator>,
}

impl AuthInterceptor {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(&self, mut request: Request, next: Next<'_>) -> Response {
        let action = request.uri().path().to_string();

        let decision = match self.authenticator.current_principal(request.headers()).await {
            Ok(principal) => self.authenticator.authorize(principal, &action).await,
            Err(e) => Err(e),
        };

        match decision {
            Ok(Authorization::Allowed(caller)) => {
                trace!(%action, ?caller, "Authorized");
                request.extensions_mut().insert(caller);
                next.run(request).await
            }
            Ok(Authorization::Denied(Denial::Unauthenticated)) => {
                debug!(%action, "No session, redirecting to login");
                Redirect::to(self.authenticator.login_path()).into_response()
            }
            Ok(Authorization::Denied(Denial::MissingRole { required })) => Error::Forbidden { action, required }.into_response(),
            Err(e) => e.into_response(),
        }
    }
}
