//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the route table, limiter registry and middleware chain from config
//! - Create the Axum router with a single catch-all handler
//! - Wire up ambient layers (request ID, tracing)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Instant;

use axum::{body::Body, extract::State, http::Request, response::Response, routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{GatewayConfig, StageKind};
use crate::http::forward::Forwarder;
use crate::http::middleware::{
    ApiKeyAuth, BoxHandler, Chain, Cors, RateLimit, RequestLogging, RequestTimeout,
};
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::LimiterRegistry;

/// Build the middleware chain in the configured order.
pub fn build_chain(config: &GatewayConfig, registry: Arc<LimiterRegistry>) -> Chain {
    let mut chain = Chain::new();
    for stage in &config.middleware {
        match stage {
            StageKind::Auth => chain.push(Box::new(ApiKeyAuth::from_config(&config.auth))),
            StageKind::RateLimit => chain.push(Box::new(RateLimit::new(registry.clone()))),
            StageKind::Cors => chain.push(Box::new(Cors)),
            StageKind::Timeout => {
                chain.push(Box::new(RequestTimeout::new(config.timeouts.request())))
            }
            StageKind::Logging => chain.push(Box::new(RequestLogging)),
        }
    }
    chain
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let routes = Arc::new(RouteTable::from_config(&config.routes));
        let registry = Arc::new(LimiterRegistry::new(routes.routes(), &config.rate_limit));
        let chain = build_chain(&config, registry.clone());

        tracing::info!(
            routes = routes.len(),
            dedicated_limiters = registry.dedicated_count(),
            stages = ?chain.names(),
            timeout_ms = config.timeouts.request_ms,
            "Gateway pipeline built"
        );

        let pipeline = chain.compose(Arc::new(Forwarder::new(routes)));
        let router = Self::build_router(pipeline);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(pipeline: BoxHandler) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(pipeline)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The Axum router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: hands the request to the composed pipeline.
///
/// Request metrics are recorded here rather than in a stage so that every
/// response counts, including rejections by auth, rate limiting and timeout.
async fn dispatch(State(pipeline): State<BoxHandler>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = pipeline.call(request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
