//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-route or global token bucket admission)
//!     → headers.rs (strip hop-by-hop headers before forwarding)
//!     → Pass to the backend
//!
//! Backend response:
//!     → headers.rs (strip hop-by-hop headers before relaying)
//! ```
//!
//! # Design Decisions
//! - Limiter state is in-memory only and resets on restart
//! - Fail closed: an empty bucket rejects, it never queues

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{LimiterRegistry, LimiterScope, TokenBucket};
