//! Header filtering between the client and backend legs.
//!
//! # Responsibilities
//! - Copy end-to-end headers verbatim, keeping repeated values
//! - Strip hop-by-hop headers (RFC 9110 §7.6.1) on both legs
//! - Strip any header named in the `Connection` header
//!
//! # Design Decisions
//! - `Host` is dropped on the request leg; the client derives it from the target
//! - Header values are never rewritten

use axum::http::header::{
    HeaderMap, HeaderName, CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE,
    TRAILER, TRANSFER_ENCODING, UPGRADE,
};

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// True for headers that only have meaning for a single connection.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    [
        &CONNECTION,
        &KEEP_ALIVE,
        &PROXY_AUTHENTICATE,
        &PROXY_AUTHORIZATION,
        &TE,
        &TRAILER,
        &TRANSFER_ENCODING,
        &UPGRADE,
    ]
    .contains(&name)
}

/// Header names listed in `Connection` (e.g. `Connection: close, x-trace`).
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

/// Copy request headers bound for the backend.
pub fn copy_request_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    let listed = connection_listed(src);
    for (name, value) in src {
        if *name == HOST || is_hop_by_hop(name) || listed.contains(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Remove hop-by-hop headers from a backend response in place.
pub fn strip_response_headers(headers: &mut HeaderMap) {
    for name in connection_listed(headers) {
        headers.remove(&name);
    }
    let hop_by_hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop_by_hop {
        headers.remove(&name);
    }
}
