//! API gateway library.
//!
//! A small HTTP gateway: every request runs through an ordered chain of
//! stages (API key auth, token-bucket rate limiting, CORS, request deadline,
//! access logging) and is then forwarded to the backend registered for its
//! exact path.
//!
//! ```text
//! client → auth → rate_limit → cors → timeout → logging → forward → backend
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
