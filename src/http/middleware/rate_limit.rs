//! Rate limiting stage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;

use crate::http::middleware::{BoxHandler, Handler, HandlerFuture, Stage};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::security::LimiterRegistry;

/// Stage admitting requests through the [`LimiterRegistry`].
#[derive(Debug, Clone)]
pub struct RateLimit {
    registry: Arc<LimiterRegistry>,
}

impl RateLimit {
    pub fn new(registry: Arc<LimiterRegistry>) -> Self {
        Self { registry }
    }
}

impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RateLimitHandler {
            registry: self.registry.clone(),
            next,
        })
    }
}

struct RateLimitHandler {
    registry: Arc<LimiterRegistry>,
    next: BoxHandler,
}

impl Handler for RateLimitHandler {
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let registry = self.registry.clone();
        let next = self.next.clone();

        Box::pin(async move {
            match registry.check(request.uri().path()) {
                Ok(_) => next.call(request).await,
                Err(scope) => {
                    tracing::warn!(
                        method = %request.method(),
                        path = %request.uri().path(),
                        limiter = scope.as_str(),
                        "Rate limit exceeded"
                    );
                    metrics::record_rate_limited(scope.as_str());
                    GatewayError::RateLimited.into_response()
                }
            }
        })
    }
}
