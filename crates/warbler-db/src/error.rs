use std::fmt;

use thiserror::Error;

/// A unique user attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Email,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username => f.write_str("username"),
            Self::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Message,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Message => f.write_str("message"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{field} is already taken")]
    Duplicate { field: Field },

    #[error("{0} not found")]
    NotFound(Entity),

    /// Unknown username and wrong password are deliberately the same error.
    #[error("invalid credentials")]
    Auth,

    #[error("not permitted")]
    Forbidden,

    #[error("users cannot follow themselves")]
    SelfFollow,

    #[error("already following this user")]
    AlreadyFollowing,

    #[error("users cannot like their own messages")]
    SelfLike,

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The SQLite message of a constraint violation, e.g.
/// `UNIQUE constraint failed: users.email`.
pub(crate) fn constraint_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(msg.as_deref().unwrap_or_default())
        }
        _ => None,
    }
}
