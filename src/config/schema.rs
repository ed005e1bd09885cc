//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

/// Default listen address (`:port` binds every interface).
pub const DEFAULT_BIND_ADDRESS: &str = ":8082";

/// Default capacity of the global fallback bucket.
pub const DEFAULT_GLOBAL_CAPACITY: u64 = 3;

/// Default refill rate (tokens per second) of the global fallback bucket.
pub const DEFAULT_GLOBAL_RATE: u64 = 1;

/// Default request deadline in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// API key allow-list and auth-exempt paths.
    pub auth: AuthConfig,

    /// Exact-match routes to backends.
    pub routes: Vec<RouteConfig>,

    /// Global fallback rate limit for paths without a dedicated bucket.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Middleware stages, outermost first.
    pub middleware: Vec<StageKind>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            auth: AuthConfig::default(),
            routes: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            middleware: StageKind::default_order().to_vec(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Replace zero or empty values with their defaults.
    ///
    /// A config file that spells out `capacity = 0` or `request_ms = 0` means
    /// "unset", the same as leaving the key out.
    pub fn apply_defaults(&mut self) {
        if self.listener.bind_address.trim().is_empty() {
            self.listener.bind_address = DEFAULT_BIND_ADDRESS.to_string();
        }
        if self.rate_limit.capacity == 0 {
            self.rate_limit.capacity = DEFAULT_GLOBAL_CAPACITY;
        }
        if self.rate_limit.rate == 0 {
            self.rate_limit.rate = DEFAULT_GLOBAL_RATE;
        }
        if self.timeouts.request_ms == 0 {
            self.timeouts.request_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address, either `ip:port` or `:port`.
    ///
    /// Hostnames such as `localhost:8082` are not resolved and fail validation.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl ListenerConfig {
    /// Parse the bind address, expanding `:port` to `0.0.0.0:port`.
    ///
    /// Only IP literals are accepted; no DNS lookup happens here.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let address = self.bind_address.trim();
        if address.starts_with(':') {
            format!("0.0.0.0{address}").parse()
        } else {
            address.parse()
        }
    }
}

/// API key authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Keys accepted in the `X-API-Key` header.
    pub api_keys: Vec<String>,

    /// Paths that bypass authentication entirely (exact match).
    pub exempt_paths: Vec<String>,
}

/// A single exact-match route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Request path, matched byte-for-byte.
    pub path: String,

    /// Backend URL the request is forwarded to.
    pub target: String,

    /// Dedicated requests-per-second limit; 0 falls back to the global bucket.
    #[serde(default)]
    pub qps: u64,
}

/// Global fallback token bucket.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum tokens held.
    pub capacity: u64,

    /// Tokens added per second.
    pub rate: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_GLOBAL_CAPACITY,
            rate: DEFAULT_GLOBAL_RATE,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline applied to every request, in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

/// Middleware stages that can be placed in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Auth,
    RateLimit,
    Cors,
    Timeout,
    Logging,
}

impl StageKind {
    /// Auth → RateLimit → CORS → Timeout → Logging.
    pub const fn default_order() -> [StageKind; 5] {
        [
            StageKind::Auth,
            StageKind::RateLimit,
            StageKind::Cors,
            StageKind::Timeout,
            StageKind::Logging,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Auth => "auth",
            StageKind::RateLimit => "rate_limit",
            StageKind::Cors => "cors",
            StageKind::Timeout => "timeout",
            StageKind::Logging => "logging",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
