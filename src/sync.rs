//! The preference synchronizer: keeps one preference consistent across the
//! in-memory published state, per-user local storage, and the remote record.
//!
//! Load ordering within a cycle: a synchronous local snapshot is published
//! first (no default-value flash on startup), then the remote is consulted
//! once, then the async local read, then the definition's default. The
//! remote is more authoritative than the local cache because it is what
//! other devices see; a valid remote value is written through to local
//! storage so the tiers agree.
//!
//! Writes are local-first: the setter publishes immediately, then persists
//! locally and best-effort pushes to the remote without blocking the caller.
//!
//! Staleness: every identity change and every setter call bumps a
//! monotonically increasing epoch. Load cycles capture the epoch when they
//! start and their results are discarded if it has moved by publish time, so
//! a slow fetch for a previous user (or one racing a fresh optimistic write)
//! can never clobber current state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};

use crate::definition::PreferenceDef;
use crate::error::PrefError;
use crate::identity::IdentitySource;
use crate::invalidation::InvalidationSource;
use crate::remote::RemoteGateway;
use crate::scope::scoped_key;
use crate::storage::StorageBackend;

/// Published synchronization state for one preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// No load cycle has run yet.
    Uninitialized,
    /// The identity provider has not finished its own initialization, so
    /// the scope is unknown and no tier can be consulted.
    Loading,
    /// The current value. Always a member of the definition's value set.
    Ready(String),
}

impl SyncState {
    pub fn value(&self) -> Option<&str> {
        match self {
            SyncState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

struct Shared {
    def: PreferenceDef,
    storage: Arc<dyn StorageBackend>,
    remote: Arc<dyn RemoteGateway>,
    identity: Arc<dyn IdentitySource>,
    state: watch::Sender<SyncState>,
    epoch: AtomicU64,
}

impl Shared {
    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Publish `next` unless the machine moved on (identity change or a
    /// newer optimistic write) since the cycle that produced it started.
    /// Skips the send when the value is unchanged so subscribers don't see
    /// redundant wakeups.
    fn publish_if_current(&self, epoch: u64, next: SyncState) {
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::Acquire) != epoch {
                tracing::debug!(
                    preference = self.def.name(),
                    "discarding stale load result"
                );
                return false;
            }
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    /// One synchronization cycle for whatever the identity source currently
    /// reports. Steps map to: snapshot publish, remote read + write-through,
    /// async local fallback, default.
    async fn load_cycle(self: Arc<Self>) {
        // Epoch before session, in that order: the run loop bumps the epoch
        // only after the identity watch already holds the new snapshot, so a
        // cycle can never pair an old session with a post-bump epoch. Paired
        // the other way round, a late result for the old identity would pass
        // the epoch check and leak into the new session.
        let epoch = self.epoch.load(Ordering::Acquire);
        let session = self.identity.current();
        if !session.ready {
            // Don't guess at a scope while the identity provider is still
            // starting up; a run-loop wakeup follows once it is ready.
            self.state.send_if_modified(|state| {
                if *state == SyncState::Loading {
                    return false;
                }
                *state = SyncState::Loading;
                true
            });
            return;
        }

        let scope = scoped_key(self.def.name(), session.identity.as_deref());

        // Flicker-free initial publish from the synchronous snapshot, or
        // the default when there is nothing usable.
        let initial = scope
            .as_deref()
            .and_then(|key| self.storage.snapshot(key))
            .and_then(|raw| self.def.normalize(&raw))
            .unwrap_or_else(|| self.def.default_value());
        self.publish_if_current(epoch, SyncState::Ready(initial.to_string()));

        let (key, identity) = match (scope, session.identity) {
            (Some(key), Some(identity)) => (key, identity),
            // Signed out: the default published above is the whole story.
            _ => return,
        };

        // Remote first; a valid value supersedes the snapshot and is
        // written through so the local tier agrees with other devices.
        if let Some(raw) = self.remote.fetch(&identity).await {
            if let Some(value) = self.def.normalize(&raw) {
                if self.epoch.load(Ordering::Acquire) == epoch {
                    if let Err(error) = self.storage.set(&key, value).await {
                        tracing::warn!(
                            preference = self.def.name(),
                            path = %self.storage.describe(&key),
                            %error,
                            "local write-through of remote value failed"
                        );
                    }
                    self.publish_if_current(epoch, SyncState::Ready(value.to_string()));
                }
                return;
            }
            tracing::debug!(
                preference = self.def.name(),
                "remote value not in the value set, falling back to local"
            );
        }

        // Async local fallback.
        match self.storage.get(&key).await {
            Ok(Some(raw)) => {
                if let Some(value) = self.def.normalize(&raw) {
                    self.publish_if_current(epoch, SyncState::Ready(value.to_string()));
                    return;
                }
                tracing::debug!(
                    preference = self.def.name(),
                    path = %self.storage.describe(&key),
                    "cached value not in the value set, treating as absent"
                );
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    preference = self.def.name(),
                    path = %self.storage.describe(&key),
                    %error,
                    "local read failed, continuing without cache"
                );
            }
        }

        // Neither tier has anything authoritative: publish the default and
        // persist nothing (there is no real choice to record yet).
        self.publish_if_current(epoch, SyncState::Ready(self.def.default_value().to_string()));
    }

    fn spawn_cycle(self: &Arc<Self>) {
        tokio::spawn(Arc::clone(self).load_cycle());
    }

    fn current_scope(&self) -> Option<String> {
        let session = self.identity.current();
        if !session.ready {
            return None;
        }
        scoped_key(self.def.name(), session.identity.as_deref())
    }
}

/// Orchestrates one preference. Construct with explicit dependencies, then
/// [`Synchronizer::spawn`] to start the run loop and obtain a handle.
pub struct Synchronizer {
    shared: Arc<Shared>,
}

impl Synchronizer {
    pub fn new(
        def: PreferenceDef,
        storage: Arc<dyn StorageBackend>,
        remote: Arc<dyn RemoteGateway>,
        identity: Arc<dyn IdentitySource>,
    ) -> Self {
        let (state, _rx) = watch::channel(SyncState::Uninitialized);
        Self {
            shared: Arc::new(Shared {
                def,
                storage,
                remote,
                identity,
                state,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.state.subscribe()
    }

    /// Starts the run loop: an initial load cycle, then reactions to
    /// identity changes, invalidation signals for this scope, and explicit
    /// refresh requests. The loop ends when the identity source and all
    /// handles are gone.
    pub fn spawn(self, invalidation: Arc<dyn InvalidationSource>) -> SyncHandle {
        let shared = self.shared;
        let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<()>();
        let mut identity_rx = shared.identity.subscribe();
        let mut invalidation_rx = invalidation.subscribe();

        let task_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            task_shared.spawn_cycle();
            let mut invalidation_open = true;
            loop {
                tokio::select! {
                    changed = identity_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // The previous identity's value must not outlive it:
                        // moving the epoch invalidates in-flight cycles, and
                        // the fresh cycle republishes from the new scope
                        // before any slow tier answers.
                        task_shared.bump_epoch();
                        task_shared.spawn_cycle();
                    }
                    event = invalidation_rx.recv(), if invalidation_open => {
                        match event {
                            Ok(changed_key) => {
                                if task_shared.current_scope().as_deref()
                                    == Some(changed_key.as_str())
                                {
                                    task_shared.spawn_cycle();
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => {
                                // Missed signals; refresh unconditionally.
                                task_shared.spawn_cycle();
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                invalidation_open = false;
                            }
                        }
                    }
                    request = refresh_rx.recv() => {
                        if request.is_none() {
                            break;
                        }
                        task_shared.spawn_cycle();
                    }
                }
            }
        });

        SyncHandle { shared, refresh_tx }
    }
}

/// Cheap clonable handle to a running synchronizer.
#[derive(Clone)]
pub struct SyncHandle {
    shared: Arc<Shared>,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl SyncHandle {
    pub fn definition(&self) -> &PreferenceDef {
        &self.shared.def
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.shared.state.borrow().clone()
    }

    /// The current value, or the definition's default while no `Ready`
    /// value has been published.
    pub fn value(&self) -> String {
        match self.state() {
            SyncState::Ready(value) => value,
            _ => self.shared.def.default_value().to_string(),
        }
    }

    /// Sets the preference.
    ///
    /// The new value is published immediately (optimistic, before any I/O),
    /// then written through to local storage and best-effort pushed to the
    /// remote in the background. A remote failure never reverts the local
    /// state. Values outside the definition's set are rejected without
    /// touching anything.
    pub fn set(&self, value: &str) -> Result<(), PrefError> {
        let shared = &self.shared;
        let Some(value) = shared.def.normalize(value) else {
            return Err(PrefError::InvalidValue {
                name: shared.def.name().to_string(),
                value: value.to_string(),
            });
        };

        // A user write supersedes any in-flight load cycle.
        shared.bump_epoch();
        shared.state.send_if_modified(|state| {
            if state.value() == Some(value) {
                return false;
            }
            *state = SyncState::Ready(value.to_string());
            true
        });

        let session = shared.identity.current();
        let Some(identity) = session.identity else {
            // Nobody signed in: the value lives in memory for this session
            // only, by design.
            return Ok(());
        };
        let Some(key) = scoped_key(shared.def.name(), Some(&identity)) else {
            return Ok(());
        };

        let shared = Arc::clone(shared);
        let value = value.to_string();
        tokio::spawn(async move {
            if let Err(error) = shared.storage.set(&key, &value).await {
                tracing::warn!(
                    preference = shared.def.name(),
                    path = %shared.storage.describe(&key),
                    %error,
                    "local write failed, value is in-memory only"
                );
            }
            if !shared.remote.push(&identity, &value).await {
                tracing::debug!(
                    preference = shared.def.name(),
                    %identity,
                    "remote write-through failed, keeping local value"
                );
            }
        });

        Ok(())
    }

    /// Re-runs the load cycle for the current identity. The
    /// resume-from-background hook.
    pub fn refresh(&self) {
        let _ = self.refresh_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_state_value_accessor() {
        assert_eq!(SyncState::Uninitialized.value(), None);
        assert_eq!(SyncState::Loading.value(), None);
        assert_eq!(SyncState::Ready("dark".into()).value(), Some("dark"));
    }
}
