use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use warbler_types::Message;

use crate::models::{MESSAGE_COLUMNS, message_from_row};
use crate::users::ensure_user;
use crate::{Database, Entity, StoreError, StoreResult};

pub const MAX_MESSAGE_LEN: usize = 140;

impl Database {
    /// Post a message as `user_id`. `timestamp` defaults to now and is never
    /// changed afterwards.
    pub fn create_message(
        &self,
        user_id: Uuid,
        text: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> StoreResult<Message> {
        validate_text(text)?;

        let message = Message {
            id: Uuid::new_v4(),
            text: text.to_string(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
            user_id,
        };

        self.with_tx(|tx| {
            ensure_user(tx, user_id)?;
            tx.execute(
                "INSERT INTO messages (id, text, timestamp, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![message.id, message.text, message.timestamp, message.user_id],
            )?;
            Ok(())
        })?;

        debug!("Message {} posted by {}", message.id, user_id);
        Ok(message)
    }

    pub fn get_message(&self, id: Uuid) -> StoreResult<Message> {
        self.with_conn(|conn| query_message(conn, id))?
            .ok_or(StoreError::NotFound(Entity::Message))
    }

    /// A user's messages, newest first.
    pub fn list_messages_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> StoreResult<Vec<Message>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3",
                MESSAGE_COLUMNS
            ))?;

            let rows = stmt
                .query_map(params![user_id, limit, offset], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Home page feed: the most recent messages by `user_id` and everyone
    /// they follow, newest first.
    pub fn home_timeline(&self, user_id: Uuid, limit: u32) -> StoreResult<Vec<Message>> {
        self.with_conn(|conn| {
            ensure_user(conn, user_id)?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followed_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.timestamp DESC, m.rowid DESC
                 LIMIT ?2",
                MESSAGE_COLUMNS
            ))?;

            let rows = stmt
                .query_map(params![user_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Delete a message on behalf of `requester_id`, who must own it.
    /// Likes on the message go with it.
    pub fn delete_message(&self, id: Uuid, requester_id: Uuid) -> StoreResult<()> {
        self.with_tx(|tx| {
            let owner = message_owner(tx, id)?.ok_or(StoreError::NotFound(Entity::Message))?;
            if owner != requester_id {
                return Err(StoreError::Forbidden);
            }

            tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(())
        })?;

        debug!("Message {} deleted", id);
        Ok(())
    }
}

fn query_message(conn: &Connection, id: Uuid) -> StoreResult<Option<Message>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM messages m WHERE m.id = ?1", MESSAGE_COLUMNS),
            [id],
            message_from_row,
        )
        .optional()?;

    Ok(row)
}

pub(crate) fn message_owner(conn: &Connection, id: Uuid) -> StoreResult<Option<Uuid>> {
    let owner = conn
        .query_row("SELECT user_id FROM messages WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;

    Ok(owner)
}

fn validate_text(text: &str) -> StoreResult<()> {
    if text.trim().is_empty() {
        return Err(StoreError::Validation("message text is required".into()));
    }
    // SQLite's length() stops at the first NUL
    if text.contains('\0') {
        return Err(StoreError::Validation("message text must not contain NUL".into()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(StoreError::Validation(format!(
            "message text must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{db, user};
    use chrono::TimeZone;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn post_and_list() {
        let db = db();
        let u1 = db.signup("a", "a@x.com", "pw", None).unwrap();

        let posted = db.create_message(u1.id, "hi", None).unwrap();

        let listed = db.list_messages_by_user(u1.id, 50, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "hi");
        assert_eq!(listed[0].id, posted.id);
        assert_eq!(db.get_message(posted.id).unwrap(), posted);
    }

    #[test]
    fn text_is_validated() {
        let db = db();
        let a = user(&db, "a");

        assert!(matches!(db.create_message(a.id, "", None), Err(StoreError::Validation(_))));
        assert!(matches!(db.create_message(a.id, "   ", None), Err(StoreError::Validation(_))));

        let too_long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(db.create_message(a.id, &too_long, None), Err(StoreError::Validation(_))));

        assert!(matches!(db.create_message(a.id, "\0hello", None), Err(StoreError::Validation(_))));
        assert!(matches!(db.create_message(a.id, "hi\0", None), Err(StoreError::Validation(_))));
        assert!(db.list_messages_by_user(a.id, 50, 0).unwrap().is_empty());

        let longest = "é".repeat(MAX_MESSAGE_LEN);
        assert!(db.create_message(a.id, &longest, None).is_ok());
    }

    #[test]
    fn unknown_owner_is_not_found() {
        let db = db();
        assert!(matches!(
            db.create_message(Uuid::new_v4(), "hello", None),
            Err(StoreError::NotFound(Entity::User))
        ));
        assert!(matches!(
            db.get_message(Uuid::new_v4()),
            Err(StoreError::NotFound(Entity::Message))
        ));
    }

    #[test]
    fn listing_is_newest_first_and_paged() {
        let db = db();
        let a = user(&db, "a");

        db.create_message(a.id, "second", at(20)).unwrap();
        db.create_message(a.id, "first", at(10)).unwrap();
        db.create_message(a.id, "third", at(30)).unwrap();

        let texts = |limit, offset| -> Vec<String> {
            db.list_messages_by_user(a.id, limit, offset)
                .unwrap()
                .into_iter()
                .map(|m| m.text)
                .collect()
        };

        assert_eq!(texts(10, 0), ["third", "second", "first"]);
        assert_eq!(texts(1, 1), ["second"]);
        assert!(texts(10, 3).is_empty());
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let db = db();
        let a = user(&db, "a");

        let msg = db.create_message(a.id, "dated", at(0)).unwrap();
        assert_eq!(db.get_message(msg.id).unwrap().timestamp, at(0).unwrap());
    }

    #[test]
    fn only_owner_may_delete() {
        let db = db();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let msg = db.create_message(a.id, "mine", None).unwrap();

        assert!(matches!(db.delete_message(msg.id, b.id), Err(StoreError::Forbidden)));
        assert!(db.get_message(msg.id).is_ok());

        db.delete_message(msg.id, a.id).unwrap();
        assert!(matches!(db.get_message(msg.id), Err(StoreError::NotFound(Entity::Message))));
        assert!(matches!(
            db.delete_message(msg.id, a.id),
            Err(StoreError::NotFound(Entity::Message))
        ));
    }

    #[test]
    fn timeline_includes_followed_users_only() {
        let db = db();
        let me = user(&db, "me");
        let friend = user(&db, "friend");
        let stranger = user(&db, "stranger");

        db.follow(me.id, friend.id).unwrap();
        db.create_message(me.id, "mine", at(1)).unwrap();
        db.create_message(friend.id, "friend's", at(2)).unwrap();
        db.create_message(stranger.id, "stranger's", at(3)).unwrap();

        let texts: Vec<_> = db
            .home_timeline(me.id, 100)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["friend's", "mine"]);

        assert_eq!(db.home_timeline(me.id, 1).unwrap().len(), 1);
    }

    #[test]
    fn deleting_owner_removes_messages() {
        let db = db();
        let a = user(&db, "a");
        let msg = db.create_message(a.id, "bye", None).unwrap();

        db.delete_user(a.id).unwrap();
        assert!(matches!(db.get_message(msg.id), Err(StoreError::NotFound(Entity::Message))));
    }
}
