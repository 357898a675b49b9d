use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::resolve_identity;
use crate::{follows, likes, messages, users};

/// Build the HTTP surface. Every route runs behind [`resolve_identity`];
/// handlers decide for themselves whether an identity is required.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::search_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/following", get(users::list_following))
        .route("/users/{id}/followers", get(users::list_followers))
        .route("/users/{id}/likes", get(users::list_likes))
        .route("/users/{id}/stats", get(users::profile_stats))
        .route("/users/{id}/messages", get(messages::list_user_messages))
        .route("/users/{id}/follow", post(follows::follow).delete(follows::unfollow))
        .route("/messages", post(messages::create_message))
        .route(
            "/messages/{id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/messages/{id}/like", post(likes::like).delete(likes::unlike))
        .route("/messages/{id}/toggle-like", post(likes::toggle_like))
        .route("/messages/{id}/likers", get(likes::list_likers))
        .route("/timeline", get(messages::timeline))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
