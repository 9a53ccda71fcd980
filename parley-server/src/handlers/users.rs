use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use shared::models::User;
use tracing::instrument;

use super::require_username;
use crate::app_state::AppState;
use crate::http::error::AppResult;

pub fn routes() -> Router {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/me", get(current_user))
}

#[instrument(skip(state))]
async fn list_users(Extension(state): Extension<Arc<AppState>>) -> AppResult<Json<Vec<User>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users))
}

#[instrument(skip(state, headers))]
async fn current_user(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let username = require_username(&headers)?;
    let user = state.identity.resolve(&username).await?;
    Ok(Json(user))
}
