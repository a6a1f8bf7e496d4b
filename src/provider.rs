use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::definition::PreferenceDef;
use crate::error::PrefError;
use crate::identity::IdentitySource;
use crate::invalidation::InvalidationSource;
use crate::remote::RemoteGateway;
use crate::storage::StorageBackend;
use crate::sync::{SyncHandle, SyncState, Synchronizer};

// One running synchronizer per preference name per process. A duplicate
// would race redundant remote fetches against the first one.
static ACTIVE_PROVIDERS: Lazy<Mutex<HashSet<&'static str>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

/// Releases the per-name registration when the provider is dropped.
#[derive(Debug)]
struct ActiveGuard {
    name: &'static str,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_PROVIDERS.lock().remove(self.name);
    }
}

/// Reactive facade over one preference's synchronizer.
///
/// Built with explicit dependencies and handed down the component tree;
/// the UI reads [`PreferenceProvider::value`], awaits
/// [`PreferenceProvider::changed`] to re-render, and calls
/// [`PreferenceProvider::set`] on user input.
pub struct PreferenceProvider {
    handle: SyncHandle,
    receiver: watch::Receiver<SyncState>,
    _guard: ActiveGuard,
}

impl PreferenceProvider {
    /// Starts the synchronizer for `def` and returns the facade.
    ///
    /// Fails with [`PrefError::AlreadyActive`] when a provider for the same
    /// preference name is already running; drop that one first.
    pub fn start(
        def: PreferenceDef,
        storage: Arc<dyn StorageBackend>,
        remote: Arc<dyn RemoteGateway>,
        identity: Arc<dyn IdentitySource>,
        invalidation: Arc<dyn InvalidationSource>,
    ) -> Result<Self, PrefError> {
        let name = def.name();
        if !ACTIVE_PROVIDERS.lock().insert(name) {
            return Err(PrefError::AlreadyActive(name.to_string()));
        }
        let guard = ActiveGuard { name };

        let synchronizer = Synchronizer::new(def, storage, remote, identity);
        let receiver = synchronizer.subscribe();
        let handle = synchronizer.spawn(invalidation);

        Ok(Self {
            handle,
            receiver,
            _guard: guard,
        })
    }

    /// The current value, or the definition's default while no value has
    /// been published yet.
    pub fn value(&self) -> String {
        self.handle.value()
    }

    pub fn state(&self) -> SyncState {
        self.handle.state()
    }

    /// See [`SyncHandle::set`]: optimistic publish, background
    /// write-through.
    pub fn set(&self, value: &str) -> Result<(), PrefError> {
        self.handle.set(value)
    }

    /// Completes when the published state changes. Errors only when the
    /// synchronizer task has shut down.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// An independent subscription for other components.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.handle.subscribe()
    }

    /// Re-runs the load cycle. Call on resume from background.
    pub fn refresh(&self) {
        self.handle.refresh()
    }

    /// A clonable handle usable without the provider itself.
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }
}
