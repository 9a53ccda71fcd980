//! WebSocket transport adapter over the chat engine.
//!
//! The socket layer only moves frames: inbound text deserializes into
//! [`ClientEvent`] at this one boundary, outbound [`ServerEvent`] values
//! serialize here. All chat semantics live in the engine.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Extension, Query, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::models::{ClientEvent, ServerEvent};
use tracing::{debug, instrument, warn};

use crate::app_state::AppState;
use crate::http::error::ApiError;
use crate::realtime::engine::{ClientConnection, EngineError};

pub fn routes() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

#[derive(Debug, Deserialize, Default)]
struct ConnectQuery {
    username: Option<String>,
}

#[instrument(skip(state, ws))]
async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // Reject before upgrading so an unauthenticated client never holds a
    // socket.
    match state.engine.connect(query.username.as_deref()).await {
        Ok(conn) => ws.on_upgrade(move |socket| handle_socket(state, conn, socket)),
        Err(EngineError::NotAuthenticated) => {
            ApiError::unauthorized("Not authenticated").into_response()
        }
        Err(err) => ApiError::internal_server_error(err.to_string()).into_response(),
    }
}

async fn handle_socket(state: Arc<AppState>, conn: ClientConnection, socket: WebSocket) {
    let ClientConnection {
        id,
        username,
        mut events,
    } = conn;
    let (mut sink, mut stream) = socket.split();
    debug!(connection = %id, %username, "websocket open");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sink.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(connection = %id, %err, "event serialization failed"),
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(text.as_str()) {
                            Ok(event) => state.engine.handle_client_event(id, event).await,
                            Err(_) => {
                                let error = ServerEvent::Error {
                                    message: "Invalid event format".to_string(),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    if sink.send(WsMessage::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum itself; binary frames carry
                    // nothing in this protocol.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.engine.disconnect(id).await;
    debug!(connection = %id, "websocket closed");
}
