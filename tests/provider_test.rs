//! Provider lifecycle: the single-active-instance constraint and the
//! explicit refresh hook.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use synced_prefs::{
    MemoryStorage, NeverInvalidate, OfflineRemote, PrefError, PreferenceDef, PreferenceProvider,
    SyncState, WatchIdentity,
};

fn sort_def(name: &'static str) -> PreferenceDef {
    PreferenceDef::new(name, &["name_asc", "name_desc", "recent"], "recent")
}

fn start(def: PreferenceDef) -> Result<PreferenceProvider, PrefError> {
    let identity = Arc::new(WatchIdentity::new());
    identity.sign_in("alice", "token-alice");
    PreferenceProvider::start(
        def,
        Arc::new(MemoryStorage::new()),
        Arc::new(OfflineRemote::new()),
        identity,
        Arc::new(NeverInvalidate::new()),
    )
}

async fn wait_for_value(rx: &mut watch::Receiver<SyncState>, expected: &str) {
    timeout(Duration::from_secs(2), async {
        loop {
            if rx.borrow_and_update().value() == Some(expected) {
                return;
            }
            rx.changed().await.expect("synchronizer task ended");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for value {:?}", expected));
}

#[tokio::test]
async fn second_provider_for_same_preference_is_rejected() {
    let def = sort_def("sort_duplicate");
    let first = start(def).unwrap();

    let second = start(def);
    assert_eq!(
        second.err(),
        Some(PrefError::AlreadyActive("sort_duplicate".into()))
    );

    // A different preference name is unaffected.
    let other = start(sort_def("sort_duplicate_other")).unwrap();
    drop(other);
    drop(first);
}

#[tokio::test]
async fn registration_is_released_on_drop() {
    let def = sort_def("sort_drop");
    let first = start(def).unwrap();
    drop(first);

    let second = start(def);
    assert!(second.is_ok());
}

#[tokio::test]
async fn changed_wakes_subscribers_on_set() {
    let def = sort_def("sort_changed");
    let mut provider = start(def).unwrap();
    let mut rx = provider.subscribe();
    wait_for_value(&mut rx, "recent").await;

    provider.set("name_asc").unwrap();
    provider.changed().await.unwrap();
    assert_eq!(provider.value(), "name_asc");
}

#[tokio::test]
async fn refresh_reruns_the_load_cycle() {
    let def = sort_def("sort_refresh");
    let storage = Arc::new(MemoryStorage::new());
    let identity = Arc::new(WatchIdentity::new());
    identity.sign_in("alice", "token-alice");

    let provider = PreferenceProvider::start(
        def,
        storage.clone(),
        Arc::new(OfflineRemote::new()),
        identity,
        Arc::new(NeverInvalidate::new()),
    )
    .unwrap();
    let mut rx = provider.subscribe();
    wait_for_value(&mut rx, "recent").await;

    // Simulate an external local write while suspended, then resume.
    let key = synced_prefs::scoped_key("sort_refresh", Some("alice")).unwrap();
    storage.insert(key, "name_desc");
    provider.refresh();
    wait_for_value(&mut rx, "name_desc").await;
}
