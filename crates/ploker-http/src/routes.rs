//! HTTP route handlers outside the websocket.
//!
//! - `/stats` reports registry counters as JSON
//! - `/session/<id>` serves the session page
//! - anything else under `/session` redirects to a freshly generated session

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
};
use ploker_core::{session_id_from_path, ManagerStats};
use std::sync::Arc;

use super::SharedState;

/// Page served for every session id.
pub const SESSION_PAGE: &str = "session.html";

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<Arc<SharedState>>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

/// Handler for GET /session, /session/ and /session/{*rest}
///
/// A well-formed session path gets the session page. Any other shape is sent
/// to a new session.
pub async fn session_handler(uri: Uri, State(state): State<Arc<SharedState>>) -> Response {
    match session_id_from_path(uri.path()) {
        Ok(id) => session_page(&state, &id).await,
        Err(_) => new_session_redirect(&state),
    }
}

fn new_session_redirect(state: &SharedState) -> Response {
    match state.manager.generate_session_id() {
        Ok(id) => {
            let location = format!("/session/{}", id);
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        Err(e) => {
            log::error!("Failed to generate random ID: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unknown server error: {}", e),
            )
                .into_response()
        }
    }
}

async fn session_page(state: &SharedState, id: &str) -> Response {
    let Some(dir) = &state.http.static_dir else {
        return (StatusCode::NOT_FOUND, "File Not Found").into_response();
    };

    let path = dir.join(SESSION_PAGE);
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            log::warn!(
                "Failed to read {} for session {}: {}",
                path.display(),
                id,
                e
            );
            (StatusCode::NOT_FOUND, "File Not Found").into_response()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{router, HttpConfig};
    use axum::body::Body;
    use axum::http::Request;
    use ploker_core::{Connection, SessionId, SessionManager, SyncConfig};
    use tower::ServiceExt;

    fn state_with(http: HttpConfig) -> Arc<SharedState> {
        Arc::new(SharedState::new(
            Arc::new(SessionManager::new()),
            SyncConfig::default(),
            http,
        ))
    }

    async fn get(state: Arc<SharedState>, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router(state).oneshot(req).await.unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    mod stats {
        use super::*;

        #[tokio::test]
        async fn empty_registry() {
            let resp = get(state_with(HttpConfig::default()), "/stats").await;
            assert_eq!(resp.status(), StatusCode::OK);
            let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
            assert_eq!(json, serde_json::json!({"sessions": 0, "connections": 0}));
        }

        #[tokio::test]
        async fn counts_live_connections() {
            let state = state_with(HttpConfig::default());
            let (a, _ra) = Connection::channel(4);
            let (b, _rb) = Connection::channel(4);
            state.manager.join(&SessionId::from("s"), a, "ada");
            state.manager.join(&SessionId::from("s"), b, "bob");

            let resp = get(state, "/stats").await;
            let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
            assert_eq!(json["sessions"], 1);
            assert_eq!(json["connections"], 2);
        }
    }

    mod session {
        use super::*;

        fn location(resp: &Response) -> String {
            resp.headers()[header::LOCATION].to_str().unwrap().to_string()
        }

        #[tokio::test]
        async fn bare_path_redirects_to_new_session() {
            for uri in ["/session", "/session/"] {
                let resp = get(state_with(HttpConfig::default()), uri).await;
                assert_eq!(resp.status(), StatusCode::FOUND, "uri {}", uri);
                let id = location(&resp).strip_prefix("/session/").unwrap().to_string();
                assert_eq!(id.len(), 32);
                assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
            }
        }

        #[tokio::test]
        async fn redirects_are_unique() {
            let state = state_with(HttpConfig::default());
            let a = location(&get(Arc::clone(&state), "/session").await);
            let b = location(&get(state, "/session").await);
            assert_ne!(a, b);
        }

        #[tokio::test]
        async fn malformed_session_path_redirects() {
            let resp = get(state_with(HttpConfig::default()), "/session/abc/").await;
            assert_eq!(resp.status(), StatusCode::FOUND);
        }

        #[tokio::test]
        async fn session_page_without_static_dir_is_not_found() {
            let resp = get(state_with(HttpConfig::default()), "/session/abc").await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }

        #[tokio::test]
        async fn session_page_is_served_from_static_dir() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join(SESSION_PAGE), "<h1>poker</h1>").unwrap();
            let state = state_with(HttpConfig {
                static_dir: Some(dir.path().to_path_buf()),
                ..HttpConfig::default()
            });

            let resp = get(state, "/session/abc?x=1").await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_text(resp).await, "<h1>poker</h1>");
        }

        #[tokio::test]
        async fn missing_session_page_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let state = state_with(HttpConfig {
                static_dir: Some(dir.path().to_path_buf()),
                ..HttpConfig::default()
            });
            let resp = get(state, "/session/abc").await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    mod sock {
        use super::*;

        #[tokio::test]
        async fn missing_params_are_rejected() {
            for uri in ["/sock", "/sock?id=abc", "/sock?name=ada", "/sock?id=&name=ada"] {
                let resp = get(state_with(HttpConfig::default()), uri).await;
                assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri {}", uri);
            }
        }

        #[tokio::test]
        async fn disallowed_origin_is_forbidden() {
            let state = state_with(HttpConfig {
                allowed_origins: vec!["poker.test".to_string()],
                ..HttpConfig::default()
            });
            let req = Request::builder()
                .uri("/sock?id=abc&name=ada")
                .header(header::ORIGIN, "https://evil.test")
                .body(Body::empty())
                .unwrap();
            let resp = router(state).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }

        #[tokio::test]
        async fn plain_get_is_not_upgraded() {
            let resp = get(state_with(HttpConfig::default()), "/sock?id=abc&name=ada").await;
            assert!(resp.status().is_client_error());
        }
    }

    mod fallback {
        use super::*;

        #[tokio::test]
        async fn static_files_are_served() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
            let state = state_with(HttpConfig {
                static_dir: Some(dir.path().to_path_buf()),
                ..HttpConfig::default()
            });
            let resp = get(state, "/app.js").await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_text(resp).await, "console.log(1)");
        }

        #[tokio::test]
        async fn unknown_path_without_static_dir_is_not_found() {
            let resp = get(state_with(HttpConfig::default()), "/nope").await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }
}
