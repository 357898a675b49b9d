use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use warbler_types::api::ToggleLikeResponse;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::session::Identity;
use crate::users::profiles;

/// POST /messages/{id}/like
pub async fn like(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let me = identity.require()?;
    blocking::run(&state.db, move |db| db.like(me, message_id)).await?;
    Ok(StatusCode::OK)
}

/// DELETE /messages/{id}/like
pub async fn unlike(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let me = identity.require()?;
    blocking::run(&state.db, move |db| db.unlike(me, message_id)).await?;
    Ok(StatusCode::OK)
}

/// POST /messages/{id}/toggle-like: the single like button.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let me = identity.require()?;
    let liked = blocking::run(&state.db, move |db| db.toggle_like(me, message_id)).await?;

    Ok(Json(ToggleLikeResponse { message_id, liked }))
}

pub async fn list_likers(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking::run(&state.db, move |db| db.list_likers(message_id)).await?;
    Ok(Json(profiles(users)))
}
