pub mod error;
pub mod follows;
pub mod likes;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

pub use error::{Entity, Field, StoreError, StoreResult};
pub use models::UserUpdate;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Handle to the Warbler SQLite store.
///
/// A single connection sits behind a mutex, so write transactions are
/// serialised. Every store operation is one unit of work: it either commits
/// as a whole or leaves no trace.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    cancel: Option<CancelToken>,
}

/// Flag shared between a waiting caller and the thread running its unit of
/// work. Once set, transactions on a [`Database::cancellable`] handle roll
/// back instead of committing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        // Cascading deletes depend on this
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cancel: None,
        })
    }

    /// A handle on the same connection whose writes are abandoned once
    /// `token` is cancelled.
    pub fn cancellable(&self, token: CancelToken) -> Database {
        Database {
            conn: Arc::clone(&self.conn),
            cancel: Some(token),
        }
    }

    /// Run a read-only query against the connection.
    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction. Commits on `Ok`; any error
    /// drops the transaction, which rolls it back. A cancelled handle rolls
    /// back too, even when `f` succeeded.
    pub fn with_tx<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self.lock()?;
        self.check_cancelled()?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;

        self.check_cancelled()?;
        tx.commit()?;
        Ok(out)
    }

    fn check_cancelled(&self) -> StoreResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                warn!("Caller went away; rolling back unit of work");
                Err(StoreError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(anyhow::anyhow!("DB lock poisoned: {}", e)))
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Database;
    use warbler_types::User;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, name: &str) -> User {
        db.signup(name, &format!("{}@example.com", name), "password", None)
            .unwrap()
    }
}
