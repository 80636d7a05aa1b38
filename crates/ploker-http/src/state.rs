//! Shared state for the HTTP server.
//!
//! Wraps the session registry and the configuration handlers need.

use ploker_core::{SessionManager, SyncConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// HTTP-facing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpConfig {
    /// Origin hosts allowed to open `/sock`, e.g. `poker.example.org` or
    /// `localhost:8080`. A leading `*.` matches any subdomain. Empty disables
    /// the check.
    pub allowed_origins: Vec<String>,
    /// Directory served as static content, holding `session.html`.
    pub static_dir: Option<PathBuf>,
}

/// Shared state available to all HTTP handlers.
#[derive(Clone)]
pub struct SharedState {
    /// Registry of live sessions.
    pub manager: Arc<SessionManager>,
    /// Connection timing and sizing.
    pub sync: SyncConfig,
    pub http: HttpConfig,
}

impl SharedState {
    pub fn new(manager: Arc<SessionManager>, sync: SyncConfig, http: HttpConfig) -> Self {
        Self {
            manager,
            sync,
            http,
        }
    }
}
