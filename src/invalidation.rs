//! External invalidation signals.
//!
//! Something other than this process's synchronizer can change a stored
//! value: another browser tab writing the same localStorage key, or the app
//! coming back from background after a long suspension. Sources of such
//! signals implement [`InvalidationSource`]; the synchronizer re-runs its
//! load cycle when a signal names its current scoped key.

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Source of "the stored value for this scoped key changed externally"
/// notifications.
pub trait InvalidationSource: Send + Sync {
    /// Subscribe to changed scoped keys. Receivers that lag simply refresh.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

/// Host-driven invalidation source.
///
/// The application calls [`ManualInvalidation::notify`] when it learns of an
/// external write: resume-from-background, a push message, a storage event.
#[derive(Debug, Clone)]
pub struct ManualInvalidation {
    tx: broadcast::Sender<String>,
}

impl ManualInvalidation {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, scoped_key: impl Into<String>) {
        // No subscribers is fine; nobody currently cares about the key.
        let _ = self.tx.send(scoped_key.into());
    }
}

impl Default for ManualInvalidation {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationSource for ManualInvalidation {
    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// The degenerate source for platforms with no external-write signal: it
/// never fires, which is a valid and safe implementation (values are only
/// refreshed on identity changes and explicit refreshes).
#[derive(Debug)]
pub struct NeverInvalidate {
    // Kept alive so subscribers see a silent channel, not a closed one.
    tx: broadcast::Sender<String>,
}

impl NeverInvalidate {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1);
        Self { tx }
    }
}

impl Default for NeverInvalidate {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationSource for NeverInvalidate {
    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub mod web {
    //! Bridges browser `storage` events into a [`ManualInvalidation`].

    use super::ManualInvalidation;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    /// Forwards cross-tab `storage` events whose key starts with
    /// `key_prefix` (see `LocalStorage::key_prefix`) into `source`, stripped
    /// back to the scoped key. The listener stays registered for the
    /// lifetime of the page.
    pub fn attach_storage_events(source: &ManualInvalidation, key_prefix: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };

        let source = source.clone();
        let prefix = key_prefix.to_string();
        let closure = Closure::<dyn FnMut(web_sys::StorageEvent)>::new(
            move |event: web_sys::StorageEvent| {
                if let Some(key) = event.key() {
                    if let Some(scoped) = key.strip_prefix(&prefix) {
                        source.notify(scoped);
                    }
                }
            },
        );

        if window
            .add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())
            .is_ok()
        {
            closure.forget();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_source_delivers_keys() {
        let source = ManualInvalidation::new();
        let mut rx = source.subscribe();

        source.notify("pref.theme.alice");
        assert_eq!(rx.recv().await.unwrap(), "pref.theme.alice");
    }

    #[test]
    fn notify_without_subscribers_is_harmless() {
        let source = ManualInvalidation::new();
        source.notify("pref.theme.alice");
    }

    #[tokio::test]
    async fn never_invalidate_stays_silent_but_open() {
        let source = NeverInvalidate::new();
        let mut rx = source.subscribe();

        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), rx.recv()).await;
        assert!(pending.is_err(), "channel should neither fire nor close");
    }
}
