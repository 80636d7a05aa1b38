//! HTTP server for Ploker.
//!
//! Exposes sessions over a WebSocket at `/sock`, plus a few plain routes for
//! session discovery and stats.

mod origin;
mod routes;
mod state;
mod websocket;

use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use routes::SESSION_PAGE;
pub use state::{HttpConfig, SharedState};

/// Build the application router.
pub fn router(state: Arc<SharedState>) -> Router {
    let static_dir = state.http.static_dir.clone();

    let mut app = Router::new()
        .route("/sock", get(websocket::ws_handler))
        .route("/stats", get(routes::stats_handler))
        .route("/session", get(routes::session_handler))
        .route("/session/", get(routes::session_handler))
        .route("/session/{*rest}", get(routes::session_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<SharedState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            log::info!("HTTP server shutting down");
        })
        .await
}

// ============================================================================
// TESTS
// ============================================================================
