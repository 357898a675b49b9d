use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use warbler_types::api::{NewMessageRequest, PageQuery};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::session::Identity;

const MAX_PAGE_SIZE: u32 = 200;

/// POST /messages
pub async fn create_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<NewMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let me = identity.require()?;
    let message = blocking::run(&state.db, move |db| db.create_message(me, &req.text, None)).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking::run(&state.db, move |db| db.get_message(message_id)).await?;
    Ok(Json(message))
}

/// DELETE /messages/{id}: owners only.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let me = identity.require()?;
    blocking::run(&state.db, move |db| db.delete_message(message_id, me)).await?;
    Ok(StatusCode::OK)
}

/// GET /users/{id}/messages?limit=&offset=
pub async fn list_user_messages(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page.limit.min(MAX_PAGE_SIZE);
    let messages = blocking::run(&state.db, move |db| {
        db.list_messages_by_user(user_id, limit, page.offset)
    })
    .await?;

    Ok(Json(messages))
}

/// GET /timeline: own messages plus those of followed users.
pub async fn timeline(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let me = identity.require()?;
    let limit = state.timeline_limit;
    let messages = blocking::run(&state.db, move |db| db.home_timeline(me, limit)).await?;

    Ok(Json(messages))
}
