use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                BLOB PRIMARY KEY,
                username          TEXT NOT NULL UNIQUE,
                email             TEXT NOT NULL COLLATE NOCASE UNIQUE,
                password          TEXT NOT NULL,
                image_url         TEXT NOT NULL,
                header_image_url  TEXT NOT NULL,
                bio               TEXT,
                location          TEXT,
                created_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE messages (
                id          BLOB PRIMARY KEY,
                text        TEXT NOT NULL CHECK (length(text) BETWEEN 1 AND 140),
                timestamp   TEXT NOT NULL,
                user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_messages_user
                ON messages(user_id, timestamp);

            CREATE TABLE follows (
                follower_id  BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                followed_id  BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (follower_id, followed_id),
                CHECK (follower_id <> followed_id)
            );

            CREATE INDEX idx_follows_followed
                ON follows(followed_id);

            CREATE TABLE likes (
                user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id  BLOB NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, message_id)
            );

            CREATE INDEX idx_likes_message
                ON likes(message_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
