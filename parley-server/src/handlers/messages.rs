use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use shared::models::Message;
use tracing::instrument;
use uuid::Uuid;

use super::require_username;
use crate::app_state::AppState;
use crate::http::error::AppResult;

pub fn routes() -> Router {
    Router::new()
        .route("/api/rooms/{room_id}/messages", get(list_messages))
        .route(
            "/api/rooms/{room_id}/messages/{message_id}",
            get(get_message).delete(delete_message),
        )
}

#[derive(Debug, Deserialize, Default)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[instrument(skip(state, headers))]
async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let username = require_username(&headers)?;
    let messages = state
        .messages
        .list(room_id, &username, query.limit)
        .await?;
    Ok(Json(messages))
}

#[instrument(skip(state, headers))]
async fn get_message(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Message>> {
    let username = require_username(&headers)?;
    let message = state.messages.get(room_id, message_id, &username).await?;
    Ok(Json(message))
}

#[instrument(skip(state, headers))]
async fn delete_message(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let username = require_username(&headers)?;
    state
        .messages
        .delete(room_id, message_id, &username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
