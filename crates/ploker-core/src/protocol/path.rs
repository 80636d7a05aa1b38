//! Session addressing.
//!
//! A session is addressed by a path of the form `.../session/<id>`. Absolute
//! URLs are accepted; their scheme, host, query and fragment are ignored.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Splits an optional `scheme://authority` prefix from the path and drops any
/// query or fragment.
static URL_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*://[^/?#]*)?(?P<path>[^?#]*)").unwrap()
});

const SESSION_SEGMENT: &str = "session";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Not a session URL: {0}")]
    NotASessionPath(String),

    #[error("Received empty session id: {0}")]
    EmptySessionId(String),
}

/// Extract the session id from a session URL or path.
///
/// `/session/abcdef` yields `abcdef`. A trailing slash, a missing id, or a
/// parent segment other than `session` is an error.
pub fn session_id_from_path(url: &str) -> Result<String, PathError> {
    let path = URL_PATH_RE
        .captures(url)
        .and_then(|caps| caps.name("path"))
        .map(|m| m.as_str())
        .unwrap_or_default();

    let (dir, id) = path
        .rsplit_once('/')
        .ok_or_else(|| PathError::NotASessionPath(url.to_string()))?;

    let parent = dir.rsplit('/').next().unwrap_or_default();
    if parent != SESSION_SEGMENT {
        return Err(PathError::NotASessionPath(url.to_string()));
    }
    if id.is_empty() {
        return Err(PathError::EmptySessionId(url.to_string()));
    }
    Ok(id.to_string())
}
