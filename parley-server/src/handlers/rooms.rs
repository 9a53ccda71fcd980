use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use shared::models::{CreateRoomRequest, Room, UpdateRoomRequest};
use tracing::instrument;
use uuid::Uuid;

use super::require_username;
use crate::app_state::AppState;
use crate::http::error::AppResult;

pub fn routes() -> Router {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/my", get(my_rooms))
        .route(
            "/api/rooms/{room_id}",
            get(get_room).patch(update_room).delete(delete_room),
        )
        .route(
            "/api/rooms/{room_id}/participants/{username}",
            post(add_participant).delete(remove_participant),
        )
}

#[instrument(skip(state, headers, payload))]
async fn create_room(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomRequest>,
) -> AppResult<impl IntoResponse> {
    let username = require_username(&headers)?;
    let user = state.identity.resolve(&username).await?;

    let room = state.rooms.create(&user.username, payload).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[instrument(skip(state, headers))]
async fn my_rooms(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Room>>> {
    let username = require_username(&headers)?;
    let rooms = state.rooms.list_for(&username).await?;
    Ok(Json(rooms))
}

#[instrument(skip(state, headers))]
async fn get_room(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Room>> {
    let username = require_username(&headers)?;
    let room = state.rooms.get(room_id, &username).await?;
    Ok(Json(room))
}

#[instrument(skip(state, headers, payload))]
async fn update_room(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<UpdateRoomRequest>,
) -> AppResult<Json<Room>> {
    let username = require_username(&headers)?;
    let room = state.rooms.update(room_id, &username, payload).await?;
    Ok(Json(room))
}

#[instrument(skip(state, headers))]
async fn delete_room(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let username = require_username(&headers)?;
    state.rooms.delete(room_id, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, headers))]
async fn add_participant(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((room_id, participant)): Path<(Uuid, String)>,
) -> AppResult<Json<Room>> {
    let username = require_username(&headers)?;
    let room = state
        .rooms
        .add_participant(room_id, &username, &participant)
        .await?;
    Ok(Json(room))
}

#[instrument(skip(state, headers))]
async fn remove_participant(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path((room_id, participant)): Path<(Uuid, String)>,
) -> AppResult<Json<Room>> {
    let username = require_username(&headers)?;
    let room = state
        .rooms
        .remove_participant(room_id, &username, &participant)
        .await?;
    Ok(Json(room))
}
