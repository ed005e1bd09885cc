//! Access logging stage.
//!
//! Logs method, path, final status and latency once everything wrapped by the
//! stage has returned. Stages placed outside it (and their rejections) are not
//! logged here; request metrics are recorded for every request by the server.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;

use crate::http::middleware::{BoxHandler, Handler, HandlerFuture, Stage};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stage emitting one log line per request.
#[derive(Debug, Clone, Default)]
pub struct RequestLogging;

impl Stage for RequestLogging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RequestLoggingHandler { next })
    }
}

struct RequestLoggingHandler {
    next: BoxHandler,
}

impl Handler for RequestLoggingHandler {
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let next = self.next.clone();

        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().clone();
            let path = request.uri().path().to_owned();
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();

            let response = next.call(request).await;

            let status = response.status();
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                elapsed_ms = %format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0),
                "Request completed"
            );

            response
        })
    }
}
