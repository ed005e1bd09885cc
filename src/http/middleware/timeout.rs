//! Request deadline stage.
//!
//! The rest of the chain is raced against a deadline. If the deadline wins,
//! the downstream future is dropped, which aborts the backend call in flight,
//! and the client gets 504. Since the response is a return value, only one of
//! the two paths can ever produce it.
//!
//! The deadline is also attached to the request as a [`Deadline`] extension so
//! the forwarder can stop relaying a response body once it passes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use tokio::time::Instant;

use crate::http::middleware::{BoxHandler, Handler, HandlerFuture, Stage};
use crate::http::response::GatewayError;
use crate::observability::metrics;

/// Absolute deadline for the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub Instant);

/// Stage bounding the downstream chain by a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimeout {
    duration: Duration,
}

impl RequestTimeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Stage for RequestTimeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RequestTimeoutHandler {
            duration: self.duration,
            next,
        })
    }
}

struct RequestTimeoutHandler {
    duration: Duration,
    next: BoxHandler,
}

impl Handler for RequestTimeoutHandler {
    fn call(&self, mut request: Request<Body>) -> HandlerFuture {
        let duration = self.duration;
        let next = self.next.clone();

        Box::pin(async move {
            let mut deadline = Instant::now() + duration;
            // An outer deadline can only tighten ours.
            if let Some(Deadline(outer)) = request.extensions().get::<Deadline>() {
                deadline = deadline.min(*outer);
            }
            request.extensions_mut().insert(Deadline(deadline));

            let method = request.method().clone();
            let path = request.uri().path().to_owned();

            match tokio::time::timeout_at(deadline, next.call(request)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        timeout_ms = duration.as_millis() as u64,
                        "Request timed out"
                    );
                    metrics::record_timeout();
                    GatewayError::Timeout.into_response()
                }
            }
        })
    }
}
