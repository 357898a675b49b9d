use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::session::Identity;

/// POST /users/{id}/follow
pub async fn follow(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let me = identity.require()?;
    blocking::run(&state.db, move |db| db.follow(me, user_id)).await?;
    Ok(StatusCode::OK)
}

/// DELETE /users/{id}/follow
pub async fn unfollow(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let me = identity.require()?;
    blocking::run(&state.db, move |db| db.unfollow(me, user_id)).await?;
    Ok(StatusCode::OK)
}
