//! WebSocket endpoint for session clients.
//!
//! Clients connect to `/sock?id=<session>&name=<display name>`. The first
//! message they receive is their client id, followed by a full snapshot
//! after every change to the session.

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use ploker_core::{serve_connection, Frame, JoinRequest, TransportError};
use serde::Deserialize;
use std::sync::Arc;

use super::origin::origin_allowed;
use super::SharedState;

/// Query parameters for `/sock`.
#[derive(Debug, Default, Deserialize)]
pub struct SockParams {
    /// Session to join.
    pub id: Option<String>,
    /// Display name of the joining client.
    pub name: Option<String>,
}

/// Handler for GET /sock
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    headers: HeaderMap,
    Query(params): Query<SockParams>,
    State(state): State<Arc<SharedState>>,
) -> Response {
    if !origin_allowed(&headers, &state.http.allowed_origins) {
        log::warn!(
            "Rejecting socket connection from origin {:?}",
            headers.get(axum::http::header::ORIGIN)
        );
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    let join = match JoinRequest::new(
        params.id.as_deref().unwrap_or_default(),
        params.name.as_deref().unwrap_or_default(),
    ) {
        Ok(join) => join,
        Err(e) => {
            log::warn!("Rejecting socket connection: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, join))
}

/// Run one client connection over an upgraded socket.
async fn handle_socket(socket: WebSocket, state: Arc<SharedState>, join: JoinRequest) {
    let (sender, receiver) = socket.split();

    let result = serve_connection(
        Arc::clone(&state.manager),
        state.sync.clone(),
        join,
        inbound(receiver),
        outbound(sender),
    )
    .await;

    match result {
        Ok(()) => log::debug!("WebSocket connection closed"),
        Err(e) => log::debug!("WebSocket connection closed: {}", e),
    }
}

/// Text messages from the client. Pings and pongs are handled by the
/// websocket layer and skipped here.
fn inbound<S>(receiver: S) -> impl Stream<Item = Result<String, TransportError>> + Unpin + Send
where
    S: Stream<Item = Result<Message, axum::Error>> + Send + 'static,
{
    Box::pin(receiver.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
            Ok(Message::Binary(_)) => Some(Err(TransportError::Encoding(
                "expected text message, got binary".to_string(),
            ))),
            Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Err(TransportError::Io(e.to_string()))),
        })
    }))
}

/// Frames to the client: snapshots as text, keepalives as websocket pings.
fn outbound<S>(sender: S) -> impl Sink<Frame, Error = TransportError> + Unpin + Send + 'static
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
{
    sender
        .sink_map_err(|e| TransportError::Io(e.to_string()))
        .with(|frame: Frame| {
            future::ready(Ok::<_, TransportError>(match frame {
                Frame::Text(text) => Message::Text(text.to_string().into()),
                Frame::Ping => Message::Ping(Bytes::new()),
            }))
        })
}

// ============================================================================
// TESTS
// ============================================================================
