//! API key authentication stage.
//!
//! Requests to exempt paths pass straight through. Everything else must carry
//! an `X-API-Key` header whose value is in the allow-list.
//!
//! # Path Matching Behavior
//!
//! Exempt paths use exact string matching against `request.uri().path()`:
//! `/public` is exempt, `/public/` is not, and query strings are ignored.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;

use crate::config::AuthConfig;
use crate::http::middleware::{BoxHandler, Handler, HandlerFuture, Stage};
use crate::http::response::GatewayError;
use crate::observability::metrics;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Canonical spelling used in the `WWW-Authenticate` challenge.
pub const API_KEY_HEADER_NAME: &str = "X-API-Key";

#[derive(Debug, Default)]
struct AuthPolicy {
    api_keys: HashSet<String>,
    exempt_paths: HashSet<String>,
}

/// Stage enforcing the API key allow-list.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    policy: Arc<AuthPolicy>,
}

impl ApiKeyAuth {
    pub fn new<K, P>(api_keys: K, exempt_paths: P) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            policy: Arc::new(AuthPolicy {
                api_keys: api_keys.into_iter().map(Into::into).collect(),
                exempt_paths: exempt_paths.into_iter().map(Into::into).collect(),
            }),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.api_keys.iter().cloned(), config.exempt_paths.iter().cloned())
    }
}

impl Stage for ApiKeyAuth {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(ApiKeyAuthHandler {
            policy: self.policy.clone(),
            next,
        })
    }
}

struct ApiKeyAuthHandler {
    policy: Arc<AuthPolicy>,
    next: BoxHandler,
}

impl Handler for ApiKeyAuthHandler {
    fn call(&self, request: Request<Body>) -> HandlerFuture {
        let policy = self.policy.clone();
        let next = self.next.clone();

        Box::pin(async move {
            let path = request.uri().path();
            if policy.exempt_paths.contains(path) {
                return next.call(request).await;
            }

            let method = request.method();
            // An empty header counts as missing.
            let api_key = match request
                .headers()
                .get(API_KEY_HEADER)
                .filter(|v| !v.as_bytes().is_empty())
            {
                Some(value) => value,
                None => {
                    tracing::warn!(method = %method, path = %path, "Authentication failed: missing API key");
                    metrics::record_auth_failure("missing");
                    return GatewayError::MissingApiKey.into_response();
                }
            };

            // A key that is not valid UTF-8 is present but can never be allowed.
            let allowed = matches!(api_key.to_str(), Ok(key) if policy.api_keys.contains(key));
            let redacted = api_key
                .to_str()
                .map(redact)
                .unwrap_or_else(|_| "***".to_string());

            if allowed {
                tracing::info!(
                    method = %method,
                    path = %path,
                    api_key = %redacted,
                    "Authentication succeeded"
                );
                next.call(request).await
            } else {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    api_key = %redacted,
                    "Authentication failed: unknown API key"
                );
                metrics::record_auth_failure("invalid");
                GatewayError::InvalidApiKey.into_response()
            }
        })
    }
}

/// Keep at most the first four characters of a key for logs.
fn redact(key: &str) -> String {
    if key.chars().count() > 8 {
        let visible: String = key.chars().take(4).collect();
        format!("{visible}***")
    } else {
        "***".to_string()
    }
}
