use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::info;
use uuid::Uuid;

use warbler_db::{StoreError, UserUpdate};
use warbler_types::api::{SearchQuery, UpdateUserRequest};
use warbler_types::{Profile, User};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::SESSION_COOKIE;
use crate::session::Identity;

/// GET /users?q= lists users whose name contains `q` (all users without it).
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.unwrap_or_default();
    let users = blocking::run(&state.db, move |db| db.search_users(&q)).await?;
    Ok(Json(profiles(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking::run(&state.db, move |db| db.get_user(user_id)).await?;
    Ok(Json(Profile::from(user)))
}

/// PATCH /users/{id}: profile edit, only on one's own account. The owner
/// gets the full account back, email included.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let me = identity.require()?;
    if me != user_id {
        return Err(StoreError::Forbidden.into());
    }

    let update = UserUpdate {
        username: req.username,
        email: req.email,
        image_url: req.image_url,
        header_image_url: req.header_image_url,
        bio: req.bio,
        location: req.location,
    };
    let user = blocking::run(&state.db, move |db| db.update_user(me, &update)).await?;
    Ok(Json(user))
}

/// DELETE /users/{id}: delete one's own account and end all its sessions.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let me = identity.require()?;
    if me != user_id {
        return Err(StoreError::Forbidden.into());
    }

    blocking::run(&state.db, move |db| db.delete_user(me)).await?;
    state.sessions.revoke_user(me).await;
    info!("Account {} closed", me);

    Ok((jar.remove(Cookie::build(SESSION_COOKIE).path("/")), StatusCode::OK))
}

pub async fn list_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking::run(&state.db, move |db| db.list_following(user_id)).await?;
    Ok(Json(profiles(users)))
}

pub async fn list_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking::run(&state.db, move |db| db.list_followers(user_id)).await?;
    Ok(Json(profiles(users)))
}

pub async fn list_likes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = blocking::run(&state.db, move |db| db.list_likes(user_id)).await?;
    Ok(Json(messages))
}

pub async fn profile_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = blocking::run(&state.db, move |db| db.profile_stats(user_id)).await?;
    Ok(Json(stats))
}

/// Everyone but the owner sees accounts without their email.
pub(crate) fn profiles(users: Vec<User>) -> Vec<Profile> {
    users.into_iter().map(Profile::from).collect()
}
