use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use warbler_db::Database;
use warbler_types::api::{LoginRequest, LoginResponse, SignupRequest};

use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{SESSION_COOKIE, session_token};
use crate::session::Sessions;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: Sessions,
    /// How many messages the home timeline shows.
    pub timeline_limit: u32,
    /// Mark the session cookie `Secure` (set when served over HTTPS).
    pub secure_cookies: bool,
}

impl AppStateInner {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            sessions: Sessions::new(),
            timeline_limit: 100,
            secure_cookies: false,
        }
    }
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking::run(&state.db, move |db| {
        db.signup(&req.username, &req.email, &req.password, req.image_url.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /login: sets the session cookie and also returns the token for
/// clients that prefer a bearer header.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = state
        .sessions
        .login(&state.db, req.username, req.password)
        .await?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies);

    Ok((jar.add(cookie), Json(LoginResponse { user, token })))
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&jar, &headers) {
        state.sessions.logout(&token).await;
        info!("Session logged out");
    }

    (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), StatusCode::OK)
}
