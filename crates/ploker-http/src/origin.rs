//! Origin checks for websocket upgrades.
//!
//! Browsers always send `Origin` on a websocket handshake, so a page served
//! from some other site cannot join sessions unless its host is listed.
//!
//! # Rules
//!
//! 1. An empty allow-list accepts everything
//! 2. Requests without an `Origin` header (non-browser clients) pass
//! 3. Same-host origins pass
//! 4. Otherwise the origin's `host[:port]` must match an allowed pattern

use axum::http::{header, HeaderMap};

/// Whether a websocket handshake with these headers may proceed.
pub fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Some(authority) = origin.to_str().ok().and_then(origin_authority) else {
        return false;
    };

    let same_host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|host| host.eq_ignore_ascii_case(authority));

    same_host || allowed.iter().any(|pattern| pattern_matches(pattern, authority))
}

/// Extract `host[:port]` from an origin such as `https://example.org:8080`.
///
/// Returns None for opaque origins (`null`) and anything without a scheme.
fn origin_authority(origin: &str) -> Option<&str> {
    let (_, rest) = origin.split_once("://")?;
    let authority = rest.split('/').next().unwrap_or(rest);
    (!authority.is_empty()).then_some(authority)
}

fn pattern_matches(pattern: &str, authority: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        let authority = authority.to_ascii_lowercase();
        let suffix = format!(".{}", suffix.to_ascii_lowercase());
        return authority.len() > suffix.len() && authority.ends_with(&suffix);
    }
    pattern.eq_ignore_ascii_case(authority)
}

// ============================================================================
// TESTS
// ============================================================================
