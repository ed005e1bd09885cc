//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (exact-match lookup)
//!     → Return: matched Route or no match (404)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → HashMap keyed by path
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Exact matching only: no prefixes, no wildcards, no regex
//! - One static target per route (no load balancing)

pub mod router;

pub use router::{Route, RouteTable};
