use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// What the synchronizer knows about the session at one instant.
///
/// `ready` is false while the identity provider is still running its own
/// initialization; until it flips to true, "no identity" means "don't know
/// yet" rather than "signed out", and no remote fetch may be issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Opaque stable user identifier, present only when authenticated.
    pub identity: Option<String>,
    /// Session token attached to remote requests.
    pub token: Option<String>,
    /// Whether the identity provider has finished initializing.
    pub ready: bool,
}

impl IdentitySnapshot {
    /// A ready, signed-in snapshot.
    pub fn signed_in(identity: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            token: Some(token.into()),
            ready: true,
        }
    }

    /// A ready snapshot with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            identity: None,
            token: None,
            ready: true,
        }
    }
}

/// Source of session state, injected into the synchronizer.
pub trait IdentitySource: Send + Sync {
    fn current(&self) -> IdentitySnapshot;
    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot>;
}

/// Watch-backed identity source the host application publishes into.
///
/// The application owns one of these next to its auth plumbing and calls
/// [`WatchIdentity::publish`] (or the `sign_in`/`sign_out` shorthands) on
/// every session change; every synchronizer subscribed to it reacts by
/// rescoping to the new identity.
#[derive(Debug)]
pub struct WatchIdentity {
    tx: watch::Sender<IdentitySnapshot>,
}

impl WatchIdentity {
    /// Starts in the not-yet-ready state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(IdentitySnapshot::default());
        Self { tx }
    }

    pub fn publish(&self, snapshot: IdentitySnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn sign_in(&self, identity: impl Into<String>, token: impl Into<String>) {
        self.publish(IdentitySnapshot::signed_in(identity, token));
    }

    pub fn sign_out(&self) {
        self.publish(IdentitySnapshot::signed_out());
    }
}

impl Default for WatchIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySource for WatchIdentity {
    fn current(&self) -> IdentitySnapshot {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let source = WatchIdentity::new();
        let snapshot = source.current();
        assert!(!snapshot.ready);
        assert_eq!(snapshot.identity, None);
    }

    #[tokio::test]
    async fn subscribers_observe_sign_in() {
        let source = WatchIdentity::new();
        let mut rx = source.subscribe();

        source.sign_in("alice", "token-1");
        rx.changed().await.unwrap();

        let snapshot = rx.borrow().clone();
        assert!(snapshot.ready);
        assert_eq!(snapshot.identity.as_deref(), Some("alice"));
        assert_eq!(snapshot.token.as_deref(), Some("token-1"));
    }

    #[test]
    fn sign_out_clears_identity_but_stays_ready() {
        let source = WatchIdentity::new();
        source.sign_in("alice", "token-1");
        source.sign_out();

        let snapshot = source.current();
        assert!(snapshot.ready);
        assert_eq!(snapshot.identity, None);
        assert_eq!(snapshot.token, None);
    }
}
