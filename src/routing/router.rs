//! Route lookup.
//!
//! # Responsibilities
//! - Store the configured routes
//! - Look up the route for a request path
//! - Build the outbound URI for a matched route
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact-match lookup via HashMap, no prefix or wildcard matching
//! - Explicit no-match rather than a silent default

use std::collections::HashMap;

use axum::http::Uri;

use crate::config::RouteConfig;

/// A compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub target: String,
    pub qps: u64,
}

impl Route {
    /// Outbound URI: the target, with the inbound query string appended.
    pub fn upstream_uri(&self, query: Option<&str>) -> Result<Uri, axum::http::Error> {
        let uri = match query.filter(|q| !q.is_empty()) {
            Some(query) if self.target.contains('?') => format!("{}&{}", self.target, query),
            Some(query) => format!("{}?{}", self.target, query),
            None => self.target.clone(),
        };
        Ok(uri.parse::<Uri>()?)
    }
}

impl From<&RouteConfig> for Route {
    fn from(config: &RouteConfig) -> Self {
        Self {
            path: config.path.clone(),
            target: config.target.clone(),
            qps: config.qps,
        }
    }
}

/// Immutable exact-match routing table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Build the table from configuration. Later duplicates replace earlier ones.
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let routes = routes
            .iter()
            .map(|r| (r.path.clone(), Route::from(r)))
            .collect();
        Self { routes }
    }

    /// Exact, byte-for-byte path match.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
