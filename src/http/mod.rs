//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, catch-all dispatch)
//!     → middleware/ (auth, rate limit, CORS, timeout, logging)
//!     → forward.rs (route lookup, outbound call, response relay)
//!     → response.rs (gateway-produced error responses)
//!     → Send to client
//! ```

pub mod forward;
pub mod middleware;
pub mod response;
pub mod server;

pub use forward::Forwarder;
pub use response::GatewayError;
pub use server::GatewayServer;
