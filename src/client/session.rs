/// Client Session
///
/// Holds the tokens of a logged-in client and broadcasts the logged-in state so
/// callers can react when a failed refresh ends the session.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use uuid::Uuid;

use crate::routes::AuthResponse;

/// Credentials held by a logged-in client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub name: String,
    pub principal_id: Uuid,
    pub access: String,
    pub refresh: String,
}

impl From<AuthResponse> for SessionTokens {
    fn from(response: AuthResponse) -> Self {
        Self {
            name: response.name,
            principal_id: response.principal_id,
            access: response.access,
            refresh: response.refresh,
        }
    }
}

/// Process-wide credential store shared by every request the client sends.
///
/// Cloning is cheap and every clone sees the same state. Observers subscribe with
/// [`AuthSession::watch`] to learn when the client is logged out, including the
/// forced logout that follows a failed refresh.
#[derive(Clone)]
pub struct AuthSession {
    tokens: Arc<RwLock<Option<SessionTokens>>>,
    authenticated: Arc<watch::Sender<bool>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        let (authenticated, _) = watch::channel(false);
        Self {
            tokens: Arc::new(RwLock::new(None)),
            authenticated: Arc::new(authenticated),
        }
    }

    // A panic while holding the lock cannot leave the Option half-written.
    fn read(&self) -> RwLockReadGuard<'_, Option<SessionTokens>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<SessionTokens>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, authenticated: bool) {
        self.authenticated.send_if_modified(|current| {
            let changed = *current != authenticated;
            *current = authenticated;
            changed
        });
    }

    pub fn establish(&self, tokens: SessionTokens) {
        tracing::debug!(user_id = %tokens.principal_id, "Session established");
        *self.write() = Some(tokens);
        self.publish(true);
    }

    /// Store a rotated pair. Returns `false` if the session was cleared meanwhile,
    /// in which case nothing is stored.
    pub fn update_tokens(&self, access: String, refresh: String) -> bool {
        let mut guard = self.write();
        match guard.as_mut() {
            Some(tokens) => {
                tokens.access = access;
                tokens.refresh = refresh;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let had_session = self.write().take().is_some();
        if had_session {
            tracing::info!("Session cleared");
        }
        self.publish(false);
    }

    pub fn snapshot(&self) -> Option<SessionTokens> {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().map(|t| t.refresh.clone())
    }

    pub fn principal_id(&self) -> Option<Uuid> {
        self.read().as_ref().map(|t| t.principal_id)
    }

    pub fn name(&self) -> Option<String> {
        self.read().as_ref().map(|t| t.name.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Receiver that flips to `false` whenever the session is cleared.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SessionTokens {
        SessionTokens {
            name: "user@example.com".to_string(),
            principal_id: Uuid::new_v4(),
            access: "access-1".to_string(),
            refresh: "refresh-1".to_string(),
        }
    }

    #[test]
    fn establish_update_clear() {
        let session = AuthSession::new();
        assert!(!session.is_authenticated());
        assert!(!session.update_tokens("a".into(), "r".into()));

        session.establish(tokens());
        assert_eq!(session.access_token().as_deref(), Some("access-1"));

        assert!(session.update_tokens("access-2".into(), "refresh-2".into()));
        assert_eq!(session.access_token().as_deref(), Some("access-2"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
        assert_eq!(session.name().as_deref(), Some("user@example.com"));

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.refresh_token().is_none());
    }

    #[test]
    fn clones_share_state() {
        let session = AuthSession::new();
        let other = session.clone();

        session.establish(tokens());
        assert!(other.is_authenticated());

        other.clear();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn watchers_see_logout() {
        let session = AuthSession::new();
        session.establish(tokens());

        let mut rx = session.watch();
        assert!(*rx.borrow());

        session.clear();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}
