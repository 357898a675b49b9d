use std::sync::OnceLock;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};
use uuid::Uuid;

use warbler_crypto::{CredentialError, hash_password, verify_password};
use warbler_types::{ProfileStats, User};

use crate::error::constraint_violation;
use crate::models::{UserRow, UserUpdate};
use crate::{Database, Entity, Field, StoreError, StoreResult};

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 254;

impl Database {
    // -- Account lifecycle --

    /// Create an account. Uniqueness of username and email is enforced by the
    /// insert itself, so two racing signups cannot both succeed.
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> StoreResult<User> {
        let username = username.trim();
        let email = email.trim();
        validate_username(username)?;
        validate_email(email)?;

        // Hash outside the connection lock
        let digest = hash_password(password).map_err(|e| match e {
            CredentialError::EmptyPassword => StoreError::Validation("password is required".into()),
            other => StoreError::Storage(other.into()),
        })?;

        let id = Uuid::new_v4();
        let image_url = non_blank(image_url).unwrap_or(DEFAULT_IMAGE_URL);

        let row = self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (id, username, email, password, image_url, header_image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, username, email, digest, image_url, DEFAULT_HEADER_IMAGE_URL],
            )
            .map_err(user_constraint)?;

            query_user(tx, id)?.ok_or(StoreError::NotFound(Entity::User))
        })?;

        info!("User {} signed up as {}", id, username);
        Ok(row.into())
    }

    /// Check a username/password pair. Both failure causes map to
    /// [`StoreError::Auth`].
    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<User> {
        let row = self.with_conn(|conn| query_user_by_username(conn, username.trim()))?;

        // An unknown username still pays for one verification
        let digest = match &row {
            Some(row) => row.password.as_str(),
            None => dummy_digest(),
        };
        let verified = verify_password(password, digest);

        match row {
            Some(row) if verified => Ok(row.into()),
            _ => {
                warn!("Rejected credentials for username {:?}", username);
                Err(StoreError::Auth)
            }
        }
    }

    pub fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.with_conn(|conn| query_user(conn, id))?
            .map(User::from)
            .ok_or(StoreError::NotFound(Entity::User))
    }

    pub fn user_exists(&self, id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| user_exists(conn, id))
    }

    pub fn update_user(&self, id: Uuid, update: &UserUpdate) -> StoreResult<User> {
        let username = update.username.as_deref().map(str::trim);
        let email = update.email.as_deref().map(str::trim);
        if let Some(username) = username {
            validate_username(username)?;
        }
        if let Some(email) = email {
            validate_email(email)?;
        }

        let row = self.with_tx(|tx| {
            let current = query_user(tx, id)?.ok_or(StoreError::NotFound(Entity::User))?;

            let image_url = match update.image_url.as_deref() {
                None => current.image_url.as_str(),
                Some(url) => non_blank(Some(url)).unwrap_or(DEFAULT_IMAGE_URL),
            };
            let header_image_url = match update.header_image_url.as_deref() {
                None => current.header_image_url.as_str(),
                Some(url) => non_blank(Some(url)).unwrap_or(DEFAULT_HEADER_IMAGE_URL),
            };

            tx.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5,
                     bio = ?6, location = ?7
                 WHERE id = ?1",
                params![
                    id,
                    username.unwrap_or(&current.username),
                    email.unwrap_or(&current.email),
                    image_url,
                    header_image_url,
                    optional_text(&update.bio, &current.bio),
                    optional_text(&update.location, &current.location),
                ],
            )
            .map_err(user_constraint)?;

            query_user(tx, id)?.ok_or(StoreError::NotFound(Entity::User))
        })?;

        Ok(row.into())
    }

    /// Delete an account. Foreign keys cascade the delete to the user's
    /// messages, the likes on those messages, the user's own likes and
    /// follow edges in both directions, all inside one transaction.
    pub fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let deleted = self.with_tx(|tx| Ok(tx.execute("DELETE FROM users WHERE id = ?1", [id])?))?;

        if deleted == 0 {
            return Err(StoreError::NotFound(Entity::User));
        }

        info!("User {} deleted", id);
        Ok(())
    }

    // -- Directory --

    /// Case-insensitive substring search on username, ordered by username.
    pub fn search_users(&self, query: &str) -> StoreResult<Vec<User>> {
        let pattern = format!("%{}%", escape_like(query.trim()));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users u WHERE u.username LIKE ?1 ESCAPE '\\' ORDER BY u.username",
                UserRow::COLUMNS
            ))?;

            let rows = stmt
                .query_map([pattern], UserRow::from_row)?
                .map(|row| row.map(User::from))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn profile_stats(&self, id: Uuid) -> StoreResult<ProfileStats> {
        self.with_conn(|conn| {
            ensure_user(conn, id)?;

            let stats = conn.query_row(
                "SELECT (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                        (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                        (SELECT COUNT(*) FROM follows WHERE followed_id = ?1),
                        (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [id],
                |row| {
                    Ok(ProfileStats {
                        messages: row.get::<_, i64>(0)? as u64,
                        following: row.get::<_, i64>(1)? as u64,
                        followers: row.get::<_, i64>(2)? as u64,
                        likes: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;

            Ok(stats)
        })
    }
}

fn dummy_digest() -> &'static str {
    static DIGEST: OnceLock<String> = OnceLock::new();
    DIGEST.get_or_init(|| hash_password("no such user").unwrap_or_default())
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> StoreResult<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM users u WHERE u.id = ?1", UserRow::COLUMNS),
            [id],
            UserRow::from_row,
        )
        .optional()?;

    Ok(row)
}

fn query_user_by_username(conn: &Connection, username: &str) -> StoreResult<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM users u WHERE u.username = ?1", UserRow::COLUMNS),
            [username],
            UserRow::from_row,
        )
        .optional()?;

    Ok(row)
}

pub(crate) fn user_exists(conn: &Connection, id: Uuid) -> StoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

pub(crate) fn ensure_user(conn: &Connection, id: Uuid) -> StoreResult<()> {
    if user_exists(conn, id)? {
        Ok(())
    } else {
        Err(StoreError::NotFound(Entity::User))
    }
}

/// Map a failed users insert/update onto the column that collided.
fn user_constraint(err: rusqlite::Error) -> StoreError {
    let field = match constraint_violation(&err) {
        Some(msg) if msg.contains("users.username") => Some(Field::Username),
        Some(msg) if msg.contains("users.email") => Some(Field::Email),
        _ => None,
    };

    match field {
        Some(field) => StoreError::Duplicate { field },
        None => err.into(),
    }
}

fn validate_username(username: &str) -> StoreResult<()> {
    if username.is_empty() {
        return Err(StoreError::Validation("username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(StoreError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> StoreResult<()> {
    if email.is_empty() {
        return Err(StoreError::Validation("email is required".into()));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(StoreError::Validation(format!(
            "email must be at most {} characters",
            MAX_EMAIL_LEN
        )));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(StoreError::Validation("invalid email address".into())),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional_text(update: &Option<String>, current: &Option<String>) -> Option<String> {
    match update {
        None => current.clone(),
        Some(text) => non_blank(Some(text)).map(str::to_string),
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
