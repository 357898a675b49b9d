use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use warbler_db::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("authentication required")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => match err {
                StoreError::Validation(_)
                | StoreError::Duplicate { .. }
                | StoreError::SelfFollow
                | StoreError::SelfLike
                | StoreError::AlreadyFollowing => StatusCode::BAD_REQUEST,
                StoreError::Auth => StatusCode::UNAUTHORIZED,
                StoreError::Forbidden => StatusCode::FORBIDDEN,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Cancelled => StatusCode::REQUEST_TIMEOUT,
                StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the logs
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
