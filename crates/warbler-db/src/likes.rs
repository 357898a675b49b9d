use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

use warbler_types::{Message, User};

use crate::messages::message_owner;
use crate::models::{MESSAGE_COLUMNS, UserRow, message_from_row};
use crate::users::ensure_user;
use crate::{Database, Entity, StoreError, StoreResult};

impl Database {
    /// Like a message. Liking an already-liked message is a no-op.
    pub fn like(&self, user_id: Uuid, message_id: Uuid) -> StoreResult<()> {
        self.with_tx(|tx| {
            check_likeable(tx, user_id, message_id)?;
            tx.execute(
                "INSERT OR IGNORE INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(())
        })?;

        debug!("{} liked message {}", user_id, message_id);
        Ok(())
    }

    /// Remove a like. Removing a like that does not exist is a no-op.
    pub fn unlike(&self, user_id: Uuid, message_id: Uuid) -> StoreResult<()> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
            )?;
            Ok(())
        })
    }

    /// Toggle a like: removes it if present, adds it if not.
    /// Returns `true` when the message is liked afterwards.
    pub fn toggle_like(&self, user_id: Uuid, message_id: Uuid) -> StoreResult<bool> {
        self.with_tx(|tx| {
            check_likeable(tx, user_id, message_id)?;

            let removed = tx.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(true)
        })
    }

    pub fn has_liked(&self, user_id: Uuid, message_id: Uuid) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2)",
                params![user_id, message_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Messages `user_id` has liked, in the order they were liked.
    pub fn list_likes(&self, user_id: Uuid) -> StoreResult<Vec<Message>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m
                 JOIN likes l ON m.id = l.message_id
                 WHERE l.user_id = ?1
                 ORDER BY l.rowid",
                MESSAGE_COLUMNS
            ))?;

            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Users who liked `message_id`, in the order they liked it.
    pub fn list_likers(&self, message_id: Uuid) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            message_owner(conn, message_id)?.ok_or(StoreError::NotFound(Entity::Message))?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users u
                 JOIN likes l ON u.id = l.user_id
                 WHERE l.message_id = ?1
                 ORDER BY l.rowid",
                UserRow::COLUMNS
            ))?;

            let rows = stmt
                .query_map([message_id], UserRow::from_row)?
                .map(|row| row.map(User::from))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// Both endpoints must exist and the liker must not own the message.
fn check_likeable(conn: &Connection, user_id: Uuid, message_id: Uuid) -> StoreResult<()> {
    let owner = message_owner(conn, message_id)?.ok_or(StoreError::NotFound(Entity::Message))?;
    ensure_user(conn, user_id)?;

    if owner == user_id {
        return Err(StoreError::SelfLike);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{db, user};

    fn like_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM likes", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn like_shows_up_on_both_sides() {
        let db = db();
        let author = user(&db, "author");
        let liker = user(&db, "liker");
        let msg = db.create_message(author.id, "Test message", None).unwrap();

        db.like(liker.id, msg.id).unwrap();

        assert_eq!(db.list_likes(liker.id).unwrap(), vec![msg.clone()]);
        assert_eq!(db.list_likers(msg.id).unwrap(), vec![liker.clone()]);
        assert!(db.has_liked(liker.id, msg.id).unwrap());
    }

    #[test]
    fn self_like_rejected() {
        let db = db();
        let author = user(&db, "author");
        let msg = db.create_message(author.id, "mine", None).unwrap();

        assert!(matches!(db.like(author.id, msg.id), Err(StoreError::SelfLike)));
        assert!(matches!(db.toggle_like(author.id, msg.id), Err(StoreError::SelfLike)));
        assert_eq!(like_count(&db), 0);
    }

    #[test]
    fn duplicate_like_is_noop() {
        let db = db();
        let author = user(&db, "author");
        let liker = user(&db, "liker");
        let msg = db.create_message(author.id, "hello", None).unwrap();

        db.like(liker.id, msg.id).unwrap();
        db.like(liker.id, msg.id).unwrap();
        assert_eq!(like_count(&db), 1);
    }

    #[test]
    fn unlike_is_idempotent() {
        let db = db();
        let author = user(&db, "author");
        let liker = user(&db, "liker");
        let msg = db.create_message(author.id, "hello", None).unwrap();

        db.unlike(liker.id, msg.id).unwrap();
        db.like(liker.id, msg.id).unwrap();
        db.unlike(liker.id, msg.id).unwrap();
        db.unlike(liker.id, msg.id).unwrap();
        assert!(db.list_likers(msg.id).unwrap().is_empty());
    }

    #[test]
    fn toggle_flips_state() {
        let db = db();
        let author = user(&db, "author");
        let liker = user(&db, "liker");
        let msg = db.create_message(author.id, "hello", None).unwrap();

        assert!(db.toggle_like(liker.id, msg.id).unwrap());
        assert!(db.has_liked(liker.id, msg.id).unwrap());
        assert!(!db.toggle_like(liker.id, msg.id).unwrap());
        assert!(!db.has_liked(liker.id, msg.id).unwrap());
    }

    #[test]
    fn missing_endpoints_are_not_found() {
        let db = db();
        let author = user(&db, "author");
        let msg = db.create_message(author.id, "hello", None).unwrap();

        assert!(matches!(
            db.like(author.id, Uuid::new_v4()),
            Err(StoreError::NotFound(Entity::Message))
        ));
        assert!(matches!(
            db.like(Uuid::new_v4(), msg.id),
            Err(StoreError::NotFound(Entity::User))
        ));
        assert!(matches!(
            db.list_likers(Uuid::new_v4()),
            Err(StoreError::NotFound(Entity::Message))
        ));
    }

    #[test]
    fn deleting_a_user_cascades_everywhere() {
        let db = db();
        let a = user(&db, "a");
        let b = user(&db, "b");

        let by_a = db.create_message(a.id, "from a", None).unwrap();
        let by_b = db.create_message(b.id, "from b", None).unwrap();
        db.like(a.id, by_b.id).unwrap();
        db.like(b.id, by_a.id).unwrap();
        db.follow(a.id, b.id).unwrap();
        db.follow(b.id, a.id).unwrap();

        db.delete_user(a.id).unwrap();

        assert!(matches!(db.get_user(a.id), Err(StoreError::NotFound(Entity::User))));
        assert!(matches!(db.get_message(by_a.id), Err(StoreError::NotFound(Entity::Message))));
        assert!(db.list_likers(by_b.id).unwrap().is_empty());
        assert!(db.list_likes(b.id).unwrap().is_empty());
        assert!(db.list_followers(b.id).unwrap().is_empty());
        assert!(db.list_following(b.id).unwrap().is_empty());
        assert_eq!(like_count(&db), 0);
    }
}
