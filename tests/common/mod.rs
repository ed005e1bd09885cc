//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::{GatewayConfig, RouteConfig};
use api_gateway::{GatewayServer, Shutdown};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::stream;
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";

/// Number of chunks sent by the `/stream` route.
pub const STREAM_CHUNKS: u32 = 5;

/// Mock backend counting every request it receives.
pub struct TestBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a backend on an ephemeral port.
///
/// - `/echo` returns the request body, echoes `X-Test`, and reports the
///   method and query string in `X-Echo-Method` / `X-Echo-Query`
/// - `/slow` answers after two seconds
/// - `/stream` sends its headers at once, then five chunks 150ms apart
/// - `/broken` sends one chunk, then fails the body
pub async fn spawn_backend() -> TestBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/slow", any(slow))
        .route("/stream", any(stream))
        .route("/broken", any(broken))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestBackend { addr, hits }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);

    let mut response = (StatusCode::OK, body).into_response();
    let out = response.headers_mut();
    if let Some(value) = headers.get("x-test") {
        out.insert("x-test", value.clone());
    }
    out.insert(
        "x-echo-method",
        HeaderValue::from_str(method.as_str()).unwrap(),
    );
    out.insert(
        "x-echo-query",
        HeaderValue::from_str(uri.query().unwrap_or("")).unwrap(),
    );
    response
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(2)).await;
    "too late"
}

async fn stream(State(hits): State<Arc<AtomicUsize>>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let chunks = stream::unfold(0u32, |n| async move {
        if n == STREAM_CHUNKS {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        Some((Ok::<_, Infallible>(Bytes::from(format!("chunk{n}\n"))), n + 1))
    });
    Body::from_stream(chunks).into_response()
}

async fn broken(State(hits): State<Arc<AtomicUsize>>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let chunks = stream::unfold(false, |sent| async move {
        if !sent {
            return Some((Ok(Bytes::from_static(b"partial")), true));
        }
        // let the head and first chunk reach the gateway before failing
        tokio::time::sleep(Duration::from_millis(50)).await;
        Some((Err(std::io::Error::other("backend crashed")), true))
    });
    Body::from_stream(chunks).into_response()
}

/// A running gateway. Dropping it shuts the server down.
pub struct TestGateway {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway { addr, shutdown }
}

/// Gateway config pointing at `backend`, with a generous global bucket.
///
/// Routes: `/api/echo`, `/public/echo` (auth-exempt), `/api/slow`,
/// `/api/stream`, `/api/broken`.
pub fn gateway_config(backend: &TestBackend) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.auth.exempt_paths = vec!["/public/echo".to_string()];
    config.rate_limit.capacity = 1_000;
    config.rate_limit.rate = 1_000;
    config.routes = vec![
        route("/api/echo", backend.url("/echo"), 0),
        route("/public/echo", backend.url("/echo"), 0),
        route("/api/slow", backend.url("/slow"), 0),
        route("/api/stream", backend.url("/stream"), 0),
        route("/api/broken", backend.url("/broken"), 0),
    ];
    config
}

pub fn route(path: &str, target: String, qps: u64) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        target,
        qps,
    }
}

/// Client without connection pooling or proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
