//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate route paths and backend targets
//! - Detect duplicate routes and duplicate middleware stages
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`, expected `ip:port` or `:port`")]
    BindAddress(String),

    #[error("route path `{0}` must start with '/'")]
    RoutePath(String),

    #[error("route path `{0}` is configured more than once")]
    DuplicateRoute(String),

    #[error("route `{path}` has invalid target `{target}`: {reason}")]
    RouteTarget {
        path: String,
        target: String,
        reason: String,
    },

    #[error("auth-exempt path `{0}` must start with '/'")]
    ExemptPath(String),

    #[error("middleware stage `{0}` is listed more than once")]
    DuplicateStage(String),
}

/// Check a fully defaulted configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen_paths = HashSet::new();
    for route in &config.routes {
        if !route.path.starts_with('/') {
            errors.push(ValidationError::RoutePath(route.path.clone()));
        }
        if !seen_paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.path.clone()));
        }
        if let Err(reason) = check_target(&route.target) {
            errors.push(ValidationError::RouteTarget {
                path: route.path.clone(),
                target: route.target.clone(),
                reason,
            });
        }
    }

    for path in &config.auth.exempt_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::ExemptPath(path.clone()));
        }
    }

    let mut seen_stages = HashSet::new();
    for stage in &config.middleware {
        if !seen_stages.insert(*stage) {
            errors.push(ValidationError::DuplicateStage(stage.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_target(target: &str) -> Result<(), String> {
    let url = Url::parse(target).map_err(|e| e.to_string())?;
    // The outbound client only speaks plain HTTP.
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
