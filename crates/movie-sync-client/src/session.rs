use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The backend answered 401; the credential is already gone
    Expired,
}

/// Holds the bearer credential and tells listeners when it goes away.
///
/// The session never acquires tokens; it only stores one and broadcasts
/// changes so the UI can decide what to do about an expired login.
pub struct Session {
    token: RwLock<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            token: RwLock::new(None),
            events,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.store(Some(token.into()));
        session
    }

    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.store(Some(token.into()));
        let _ = self.events.send(SessionEvent::SignedIn);
    }

    /// Explicit logout
    pub fn clear(&self) {
        self.store(None);
        let _ = self.events.send(SessionEvent::SignedOut);
    }

    /// Called by the transport on a 401
    pub fn expire(&self) {
        self.store(None);
        info!(operation = "session_expired", "Session credential cleared after 401");
        let _ = self.events.send(SessionEvent::Expired);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn store(&self, value: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expire_clears_token_and_notifies() {
        let session = Session::with_token("abc");
        let mut events = session.subscribe();

        session.expire();

        assert_eq!(session.token(), None);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[test]
    fn test_set_token_without_listeners() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        session.set_token("xyz");
        assert_eq!(session.token().as_deref(), Some("xyz"));
    }
}
