//! # synced_prefs
//!
//! Keeps user-scoped, enumerated preferences (color theme, sort order, view
//! density, ...) consistent across three tiers: the in-memory published
//! state, per-user persistent local storage, and a remote backend.
//!
//! The design priorities are:
//!
//! - **Partial availability:** any tier may be missing or failing; the
//!   published value degrades to the next tier and, at worst, the default.
//!   No storage or network problem ever surfaces as a user-facing error.
//! - **No cross-account bleed:** every persisted value is keyed by both
//!   preference name and user identity, and an identity change discards the
//!   old in-memory value before anything else happens.
//! - **No startup flicker:** a synchronous local snapshot is published
//!   before the (slower) remote read settles.
//! - **Local-first writes:** the setter publishes immediately and persists
//!   in the background; the remote is best-effort.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synced_prefs::{
//!     MemoryStorage, NeverInvalidate, OfflineRemote, PreferenceDef, PreferenceProvider,
//!     WatchIdentity,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let theme = PreferenceDef::new("theme", &["light", "dark", "system"], "system");
//!
//!     let identity = Arc::new(WatchIdentity::new());
//!     identity.sign_in("user-42", "session-token");
//!
//!     let provider = PreferenceProvider::start(
//!         theme,
//!         Arc::new(MemoryStorage::new()),
//!         Arc::new(OfflineRemote::new()),
//!         identity.clone(),
//!         Arc::new(NeverInvalidate::new()),
//!     )
//!     .expect("no other theme provider is running");
//!
//!     provider.set("dark").expect("member of the value set");
//!     println!("theme is {}", provider.value());
//! }
//! ```

pub mod definition;
pub mod error;
pub mod identity;
pub mod invalidation;
pub mod provider;
pub mod remote;
pub mod scope;
pub mod storage;
pub mod sync;

pub use definition::PreferenceDef;
pub use error::PrefError;
pub use identity::{IdentitySnapshot, IdentitySource, WatchIdentity};
pub use invalidation::{InvalidationSource, ManualInvalidation, NeverInvalidate};
pub use provider::PreferenceProvider;
pub use remote::{OfflineRemote, RemoteGateway};
pub use scope::scoped_key;
pub use storage::{MemoryStorage, StorageBackend};
pub use sync::{SyncHandle, SyncState, Synchronizer};

#[cfg(not(target_arch = "wasm32"))]
pub use remote::http::HttpRemoteGateway;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::native::FileStorage;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub use storage::wasm::LocalStorage;
