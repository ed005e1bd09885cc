//! Responses produced by the gateway itself.
//!
//! # Responsibilities
//! - Map each request-path failure to exactly one HTTP status
//! - Attach the hint headers clients rely on (`WWW-Authenticate`, `Retry-After`)
//! - Render a plain-text status line as the body
//!
//! # Design Decisions
//! - Errors become responses at the stage that detects them; they never travel
//!   between stages as values
//! - No JSON error bodies

use axum::http::header::{HeaderValue, RETRY_AFTER, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::middleware::auth::API_KEY_HEADER_NAME;

/// Failures the gateway answers on behalf of the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("401 Unauthorized: Missing X-API-Key")]
    MissingApiKey,

    #[error("401 Unauthorized: Invalid X-API-Key")]
    InvalidApiKey,

    #[error("429 Too Many Requests")]
    RateLimited,

    #[error("404 Route Not Found")]
    RouteNotFound,

    #[error("Failed to create proxy request")]
    BuildRequest(#[source] axum::http::Error),

    #[error("Failed to forward request")]
    Upstream(#[source] hyper_util::client::legacy::Error),

    #[error("Request timeout")]
    Timeout,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingApiKey | GatewayError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::BuildRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        let headers = response.headers_mut();
        match self {
            GatewayError::MissingApiKey => {
                headers.insert(
                    WWW_AUTHENTICATE,
                    HeaderValue::from_static(API_KEY_HEADER_NAME),
                );
            }
            GatewayError::RateLimited => {
                headers.insert(RETRY_AFTER, HeaderValue::from_static("1"));
            }
            _ => {}
        }
        response
    }
}
