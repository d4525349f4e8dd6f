//! Extractors for the caller recorded by the auth interceptor.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{api::models::users::CurrentUser, auth::principal::Caller, errors::Error};

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Caller>() {
            Some(Caller::Authenticated(user)) => Ok(user.clone()),
            _ => Err(Error::Unauthenticated { message: None }),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Error;

    /// Requests that bypassed the interceptor (there should be none) count as anonymous.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or(Caller::Anonymous))
    }
}
