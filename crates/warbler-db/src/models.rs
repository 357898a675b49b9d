//! Database row types: these map directly to SQLite rows.
//! Distinct from warbler-types API models to keep the DB layer independent.

use rusqlite::Row;
use uuid::Uuid;
use warbler_types::{Message, User};

pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl UserRow {
    /// Column list matching [`UserRow::from_row`]; the table must be aliased `u`.
    pub(crate) const COLUMNS: &'static str =
        "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            image_url: row.get(4)?,
            header_image_url: row.get(5)?,
            bio: row.get(6)?,
            location: row.get(7)?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            image_url: row.image_url,
            header_image_url: row.header_image_url,
            bio: row.bio,
            location: row.location,
        }
    }
}

/// Column list for messages; the table must be aliased `m`.
pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
    })
}

/// Partial profile edit. `None` leaves a field unchanged; an empty
/// `bio` or `location` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}
