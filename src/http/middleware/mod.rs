//! Middleware stages and their composition.
//!
//! # Data Flow
//! ```text
//! Request → Auth → RateLimit → CORS → Timeout → Logging → Forwarder
//!             ↓        ↓         ↓        ↓
//!           401      429     200 (OPTIONS) 504
//! ```
//!
//! A [`Stage`] wraps the next handler and decides whether to call it or to
//! answer on its own. [`Chain`] folds its stages right-to-left over the final
//! handler, so the first stage listed is the outermost: it runs first on the
//! way in and last on the way out.

pub mod auth;
pub mod cors;
pub mod logging;
pub mod rate_limit;
pub mod timeout;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

pub use auth::ApiKeyAuth;
pub use cors::Cors;
pub use logging::RequestLogging;
pub use rate_limit::RateLimit;
pub use timeout::{Deadline, RequestTimeout};

/// Future returned by every handler in the chain.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Something that turns a request into a response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request<Body>) -> HandlerFuture;
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// A policy stage that wraps the next handler.
pub trait Stage: Send + Sync {
    /// Stage name for logging.
    fn name(&self) -> &'static str;

    fn wrap(&self, next: BoxHandler) -> BoxHandler;
}

/// Adapter turning an async function into a [`Handler`].
pub struct HandlerFn<F>(F);

/// Wrap an async function as a shared handler.
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        Box::pin((self.0)(request))
    }
}

/// Ordered list of stages, outermost first.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Stage>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside the ones already added.
    #[cfg(test)]
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Wrap `handler` so the first stage runs first.
    pub fn compose(&self, handler: BoxHandler) -> BoxHandler {
        self.stages
            .iter()
            .rev()
            .fold(handler, |next, stage| stage.wrap(next))
    }
}
