use std::sync::Arc;

use tracing::error;

use warbler_db::{CancelToken, Database, StoreResult};

use crate::error::ApiError;

/// Run a store operation on the blocking pool. Each call is one unit of
/// work: the closure's transaction has committed or rolled back by the
/// time this resolves.
///
/// If the returned future is dropped first (a request timeout, a client
/// disconnect), the work is cancelled and its transaction rolls back
/// rather than committing.
pub async fn run<F, T>(db: &Arc<Database>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let token = CancelToken::new();
    let handle = db.cancellable(token.clone());
    let _guard = CancelOnDrop(token);

    tokio::task::spawn_blocking(move || f(&handle))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
        .map_err(ApiError::from)
}

struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use warbler_db::StoreError;

    #[tokio::test]
    async fn completed_write_commits() {
        let db = Arc::new(Database::open_in_memory().unwrap());

        let created = run(&db, |db| db.signup("alice", "alice@example.com", "password", None))
            .await
            .unwrap();

        assert_eq!(db.get_user(created.id).unwrap(), created);
    }

    #[tokio::test]
    async fn timed_out_write_leaves_no_row() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        let write = run(&db, move |db| {
            // Hold the work until the caller has given up on it
            go_rx.recv().ok();
            let result = db.signup("late", "late@example.com", "password", None);
            done_tx.send(matches!(result, Err(StoreError::Cancelled))).ok();
            result
        });

        let outcome = tokio::time::timeout(Duration::from_millis(20), write).await;
        assert!(outcome.is_err());

        go_tx.send(()).unwrap();
        let cancelled = tokio::task::spawn_blocking(move || {
            done_rx.recv_timeout(Duration::from_secs(30))
        })
        .await
        .unwrap()
        .unwrap();

        assert!(cancelled);
        assert!(db.search_users("late").unwrap().is_empty());
        assert!(matches!(
            db.authenticate("late", "password"),
            Err(StoreError::Auth)
        ));
    }
}
