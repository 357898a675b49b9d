use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use warbler_crypto::generate_session_token;
use warbler_db::Database;
use warbler_types::User;

use crate::blocking;
use crate::error::ApiError;

/// Who is acting on a request. Every request starts out `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(Uuid),
}

impl Identity {
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(id) => Some(id),
        }
    }

    /// The acting user, or `Unauthorized` for anonymous requests.
    pub fn require(self) -> Result<Uuid, ApiError> {
        self.user_id().ok_or(ApiError::Unauthorized)
    }
}

/// In-memory session table: opaque token -> user id.
///
/// Reads far outnumber writes, so the map sits behind an `RwLock`. Issuing
/// and revoking a token each take the write lock once.
#[derive(Default)]
pub struct Sessions {
    tokens: RwLock<HashMap<String, Uuid>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticate and issue a fresh token bound to the user.
    pub async fn login(
        &self,
        db: &Arc<Database>,
        username: String,
        password: String,
    ) -> Result<(User, String), ApiError> {
        let user = blocking::run(db, move |db| db.authenticate(&username, &password)).await?;
        let token = self.issue(user.id).await;

        info!("User {} logged in", user.id);
        Ok((user, token))
    }

    pub async fn issue(&self, user_id: Uuid) -> String {
        let token = generate_session_token();
        self.tokens.write().await.insert(token.clone(), user_id);
        token
    }

    /// Invalidate a token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) {
        if let Some(user_id) = self.tokens.write().await.remove(token) {
            debug!("Session ended for user {}", user_id);
        }
    }

    /// Resolve a presented token to the acting identity. A token whose user
    /// has since been deleted is dropped and resolves to `Anonymous`.
    pub async fn resolve(
        &self,
        db: &Arc<Database>,
        token: Option<&str>,
    ) -> Result<Identity, ApiError> {
        let Some(token) = token else {
            return Ok(Identity::Anonymous);
        };

        let Some(user_id) = self.tokens.read().await.get(token).copied() else {
            return Ok(Identity::Anonymous);
        };

        if blocking::run(db, move |db| db.user_exists(user_id)).await? {
            Ok(Identity::Authenticated(user_id))
        } else {
            self.tokens.write().await.remove(token);
            debug!("Dropped session of deleted user {}", user_id);
            Ok(Identity::Anonymous)
        }
    }

    /// Drop every token bound to `user_id`.
    pub async fn revoke_user(&self, user_id: Uuid) {
        self.tokens.write().await.retain(|_, owner| *owner != user_id);
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbler_db::StoreError;

    fn setup() -> (Arc<Database>, Sessions, User) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user = db.signup("a", "a@x.com", "pw", None).unwrap();
        (db, Sessions::new(), user)
    }

    #[tokio::test]
    async fn login_then_resolve() {
        let (db, sessions, user) = setup();

        let (logged_in, token) = sessions.login(&db, "a".into(), "pw".into()).await.unwrap();
        assert_eq!(logged_in, user);

        let identity = sessions.resolve(&db, Some(&token)).await.unwrap();
        assert_eq!(identity, Identity::Authenticated(user.id));
        assert_eq!(identity.require().unwrap(), user.id);
    }

    #[tokio::test]
    async fn bad_credentials_issue_nothing() {
        let (db, sessions, _) = setup();

        let err = sessions.login(&db, "a".into(), "nope".into()).await.unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::Auth)));
        let err = sessions.login(&db, "b".into(), "pw".into()).await.unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::Auth)));
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_anonymous() {
        let (db, sessions, _) = setup();

        assert_eq!(sessions.resolve(&db, None).await.unwrap(), Identity::Anonymous);
        assert_eq!(
            sessions.resolve(&db, Some("made-up")).await.unwrap(),
            Identity::Anonymous
        );
        assert!(matches!(Identity::Anonymous.require(), Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (db, sessions, user) = setup();
        let token = sessions.issue(user.id).await;

        sessions.logout(&token).await;
        sessions.logout(&token).await;

        assert_eq!(sessions.resolve(&db, Some(&token)).await.unwrap(), Identity::Anonymous);
    }

    #[tokio::test]
    async fn deleted_user_session_is_not_resurrected() {
        let (db, sessions, user) = setup();
        let token = sessions.issue(user.id).await;

        db.delete_user(user.id).unwrap();
        assert_eq!(sessions.resolve(&db, Some(&token)).await.unwrap(), Identity::Anonymous);
        assert!(sessions.is_empty().await);

        // Same username again gets a different id; the old token stays dead
        db.signup("a", "a@x.com", "pw", None).unwrap();
        assert_eq!(sessions.resolve(&db, Some(&token)).await.unwrap(), Identity::Anonymous);
    }

    #[tokio::test]
    async fn revoke_user_drops_all_their_tokens() {
        let (db, sessions, user) = setup();
        let other = db.signup("b", "b@x.com", "pw", None).unwrap();

        sessions.issue(user.id).await;
        sessions.issue(user.id).await;
        let kept = sessions.issue(other.id).await;

        sessions.revoke_user(user.id).await;
        assert_eq!(sessions.len().await, 1);
        assert_eq!(
            sessions.resolve(&db, Some(&kept)).await.unwrap(),
            Identity::Authenticated(other.id)
        );
    }
}
