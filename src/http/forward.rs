//! Forwarding to backends.
//!
//! # Responsibilities
//! - Resolve the request path to a route (exact match)
//! - Build the outbound request: same method, filtered headers, streamed body
//! - Relay the backend status, headers and streamed body to the client
//!
//! # Design Decisions
//! - Plain client: no retries, no per-call timeout (the Timeout stage owns the deadline)
//! - Dropping the forwarding future aborts the outbound call
//! - Body is streamed, never buffered; a failure mid-body aborts the response
//!   because status and headers have already gone out

use std::pin::Pin;
use std::sync::Arc;

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use futures_util::stream::{self, StreamExt};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::time::Sleep;

use crate::http::middleware::{Deadline, Handler, HandlerFuture};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::headers;

/// Outbound HTTP client.
pub type HttpClient = Client<HttpConnector, Body>;

/// Failure while relaying a backend body after headers were sent.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to copy response body: {0}")]
    Copy(#[source] axum::Error),

    #[error("request deadline elapsed while relaying response body")]
    DeadlineExceeded,
}

/// Final handler of the chain: forwards to the matched backend.
#[derive(Clone)]
pub struct Forwarder {
    routes: Arc<RouteTable>,
    client: HttpClient,
}

impl Forwarder {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { routes, client }
    }

    async fn forward(
        routes: &RouteTable,
        client: &HttpClient,
        request: Request<Body>,
    ) -> Result<Response<Body>, GatewayError> {
        let path = request.uri().path().to_owned();
        let route = match routes.match_path(&path) {
            Some(route) => route,
            None => {
                tracing::debug!(path = %path, "No route matched");
                return Err(GatewayError::RouteNotFound);
            }
        };

        let deadline = request.extensions().get::<Deadline>().copied();
        let (parts, body) = request.into_parts();

        let uri = route.upstream_uri(parts.uri.query()).map_err(|e| {
            tracing::error!(path = %path, target = %route.target, error = %e, "Invalid upstream URI");
            GatewayError::BuildRequest(e)
        })?;

        let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
        if let Some(outbound) = builder.headers_mut() {
            headers::copy_request_headers(&parts.headers, outbound);
        }
        let outbound = builder.body(body).map_err(|e| {
            tracing::error!(path = %path, error = %e, "Failed to build proxy request");
            GatewayError::BuildRequest(e)
        })?;

        tracing::debug!(
            method = %parts.method,
            path = %path,
            target = %route.target,
            "Forwarding request"
        );

        let response = client.request(outbound).await.map_err(|e| {
            tracing::error!(
                method = %parts.method,
                path = %path,
                target = %route.target,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_upstream_error("transport");
            GatewayError::Upstream(e)
        })?;

        let (mut parts, body) = response.into_parts();
        headers::strip_response_headers(&mut parts.headers);
        Ok(Response::from_parts(parts, relay_body(body, deadline)))
    }
}

impl Handler for Forwarder {
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let forwarder = self.clone();
        Box::pin(async move {
            match Self::forward(&forwarder.routes, &forwarder.client, request).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            }
        })
    }
}

struct Relay {
    data: BodyDataStream,
    deadline: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

async fn deadline_elapsed(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Stream the backend body, ending it with an error on copy failure or deadline.
fn relay_body(body: Incoming, deadline: Option<Deadline>) -> Body {
    let relay = Relay {
        data: Body::new(body).into_data_stream(),
        deadline: deadline.map(|Deadline(at)| Box::pin(tokio::time::sleep_until(at))),
        finished: false,
    };

    Body::from_stream(stream::unfold(relay, |mut relay| async move {
        if relay.finished {
            return None;
        }
        tokio::select! {
            biased;
            chunk = relay.data.next() => match chunk {
                Some(Ok(bytes)) => Some((Ok(bytes), relay)),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to copy response body");
                    metrics::record_upstream_error("body");
                    relay.finished = true;
                    Some((Err(RelayError::Copy(e)), relay))
                }
                None => None,
            },
            _ = deadline_elapsed(&mut relay.deadline) => {
                tracing::warn!("Deadline elapsed while relaying response body");
                metrics::record_upstream_error("body_deadline");
                relay.finished = true;
                Some((Err(RelayError::DeadlineExceeded), relay))
            }
        }
    }))
}
