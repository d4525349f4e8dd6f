//! Interceptor chain in front of the router.
//!
//! An [`Interceptor`] receives each request together with a [`Next`]
//! continuation. It may pass the request on (`next.run(request)`), inspect or
//! rewrite the response it gets back, or answer on its own without calling
//! `next` at all. The last continuation hands the request to the router.
//!
//! Chains are assembled once with [`InterceptorChain::builder`] and frozen;
//! the order they run in is the order they were added.
//!
//! ```ignore
//! let chain = InterceptorChain::builder()
//!     .with(RequestTracing)
//!     .with(AuthInterceptor::new(authenticator))
//!     .build();
//! let service = from_fn_with_state(chain, run_chain).layer(router);
//! ```
//!
//! Installing the chain with `from_fn_with_state(..).layer(router)` rather
//! than `Router::layer` makes it run before path matching, so unmatched paths
//! are intercepted too.

pub mod auth;
pub mod request_id;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use tracing::error;

use crate::errors::Error;

pub use auth::AuthInterceptor;
pub use request_id::RequestTracing;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, request: Request, next: Next<'_>) -> Response;
}

/// The rest of the chain after the current interceptor
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    endpoint: axum::middleware::Next,
}

impl Next<'_> {
    /// Run the remaining interceptors, then the router
    pub async fn run(self, request: Request) -> Response {
        match self.rest.split_first() {
            Some((current, rest)) => {
                current
                    .intercept(
                        request,
                        Next {
                            rest,
                            endpoint: self.endpoint,
                        },
                    )
                    .await
            }
            None => self.endpoint.run(request).await,
        }
    }
}

/// An ordered, immutable list of interceptors. Cheap to clone.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl InterceptorChain {
    pub fn builder() -> InterceptorChainBuilder {
        InterceptorChainBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run one request through the chain.
    ///
    /// A panic anywhere below this point (an interceptor or the handler)
    /// becomes a 500 for this request only.
    pub async fn handle(&self, request: Request, endpoint: axum::middleware::Next) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let next = Next {
            rest: &self.interceptors,
            endpoint,
        };

        match AssertUnwindSafe(next.run(request)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                error!(%method, %path, panic = %panic_message(panic.as_ref()), "Request handling panicked");
                Error::Internal {
                    operation: format!("handle {method} {path}"),
                }
                .into_response()
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[derive(Default)]
pub struct InterceptorChainBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChainBuilder {
    /// Append an interceptor. It runs after every interceptor added before it.
    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> InterceptorChain {
        InterceptorChain {
            interceptors: self.interceptors.into(),
        }
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`
pub async fn run_chain(State(chain): State<InterceptorChain>, request: Request, next: axum::middleware::Next) -> Response {
    chain.handle(request, next).await
}
