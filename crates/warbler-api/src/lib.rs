pub mod auth;
pub mod blocking;
pub mod error;
pub mod follows;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
pub use session::{Identity, Sessions};
