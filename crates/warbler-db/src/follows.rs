use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use warbler_types::User;

use crate::error::constraint_violation;
use crate::models::UserRow;
use crate::users::ensure_user;
use crate::{Database, StoreError, StoreResult};

impl Database {
    /// Record that `follower_id` follows `followed_id`. The composite primary
    /// key rejects a second edge even if two requests race.
    pub fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<()> {
        if follower_id == followed_id {
            return Err(StoreError::SelfFollow);
        }

        self.with_tx(|tx| {
            ensure_user(tx, follower_id)?;
            ensure_user(tx, followed_id)?;

            tx.execute(
                "INSERT INTO follows (follower_id, followed_id) VALUES (?1, ?2)",
                params![follower_id, followed_id],
            )
            .map_err(follow_constraint)?;

            Ok(())
        })?;

        debug!("{} now follows {}", follower_id, followed_id);
        Ok(())
    }

    /// Remove a follow edge. Removing an edge that does not exist is a no-op.
    pub fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<()> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower_id, followed_id],
            )?;
            Ok(())
        })
    }

    pub fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
                params![follower_id, followed_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Users `user_id` follows, oldest edge first.
    pub fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            query_edge_users(
                conn,
                "JOIN follows f ON u.id = f.followed_id WHERE f.follower_id = ?1",
                user_id,
            )
        })
    }

    /// Users following `user_id`, oldest edge first.
    pub fn list_followers(&self, user_id: Uuid) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;
            query_edge_users(
                conn,
                "JOIN follows f ON u.id = f.follower_id WHERE f.followed_id = ?1",
                user_id,
            )
        })
    }
}

fn query_edge_users(conn: &Connection, join: &str, user_id: Uuid) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users u {} ORDER BY f.rowid",
        UserRow::COLUMNS,
        join
    ))?;

    let users = stmt
        .query_map([user_id], UserRow::from_row)?
        .map(|row| row.map(User::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

fn follow_constraint(err: rusqlite::Error) -> StoreError {
    let mapped = match constraint_violation(&err) {
        Some(msg) if msg.starts_with("UNIQUE") => Some(StoreError::AlreadyFollowing),
        Some(msg) if msg.starts_with("CHECK") => Some(StoreError::SelfFollow),
        _ => None,
    };

    mapped.unwrap_or_else(|| err.into())
}
