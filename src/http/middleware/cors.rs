//! Permissive CORS stage.
//!
//! Preflight (`OPTIONS`) requests are answered here with 200 and an empty
//! body. Every other response passing back through the stage gets the CORS
//! headers, unless the backend already set them.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;

use crate::http::middleware::{BoxHandler, Handler, HandlerFuture, Stage};

const CORS_HEADERS: [(HeaderName, HeaderValue); 3] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
    (
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    ),
    (
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    ),
];

/// Stage adding allow-all cross-origin headers.
#[derive(Debug, Clone, Default)]
pub struct Cors;

impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(CorsHandler { next })
    }
}

struct CorsHandler {
    next: BoxHandler,
}

impl Handler for CorsHandler {
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let next = self.next.clone();

        Box::pin(async move {
            let mut response = if *request.method() == Method::OPTIONS {
                tracing::debug!(path = %request.uri().path(), "Answering CORS preflight");
                StatusCode::OK.into_response()
            } else {
                next.call(request).await
            };
            apply_cors_headers(response.headers_mut());
            response
        })
    }
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.entry(name).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::handler_fn;
    use crate::http::middleware::test_support::{counting_handler, request};
    use axum::body::to_bytes;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let (terminal, calls) = counting_handler();
        let handler = Cors.wrap(terminal);

        let response = handler.call(request("OPTIONS", "/api/echo")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_proceed_with_headers() {
        let (terminal, calls) = counting_handler();
        let handler = Cors.wrap(terminal);

        let response = handler.call(request("POST", "/api/echo")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn test_backend_cors_headers_win() {
        let backend = handler_fn(|_request| async {
            let mut response = StatusCode::OK.into_response();
            response.headers_mut().insert(
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("https://app.example"),
            );
            response
        });
        let handler = Cors.wrap(backend);

        let response = handler.call(request("GET", "/")).await;

        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
    }
}
