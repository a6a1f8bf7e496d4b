use std::fmt::Debug;

use async_trait::async_trait;

/// Storage abstraction over the platform key-value store.
///
/// Contract: a missing key is `Ok(None)`, never an error. Backends may
/// return `Err` for genuine I/O trouble, but callers treat any failure as
/// "absent" / "not persisted" and continue with degraded behavior; nothing
/// in this crate aborts a synchronization cycle over a storage error.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, std::io::Error>;

    /// Write `value` under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error>;

    /// Best-effort synchronous read, used for the flicker-free initial
    /// publish on startup. Backends without a cheap synchronous path keep
    /// the default and the caller falls back to the async read.
    fn snapshot(&self, _key: &str) -> Option<String> {
        None
    }

    /// Full path/key for diagnostics and log messages.
    fn describe(&self, key: &str) -> String;
}

/// In-memory backend.
///
/// Serves two roles: the hermetic backend for unit tests, and the degenerate
/// "session-only" backend on platforms with no persistent store (values
/// survive until the process exits, nothing leaks across runs).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: parking_lot::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly, bypassing the async interface. Test helper.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    /// Read a value directly, bypassing the async interface. Test helper.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Whether anything has been stored at all. Test helper.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn snapshot(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn describe(&self, key: &str) -> String {
        format!("memory::{}", key)
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::StorageBackend;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    /// File-per-key backend rooted at a base directory.
    ///
    /// Writes go to a temporary file in the same directory and are renamed
    /// into place, so a crash mid-write never leaves a corrupt value behind.
    /// Keys produced by [`crate::scoped_key`] are already filename-safe.
    #[derive(Debug)]
    pub struct FileStorage {
        base_dir: PathBuf,
    }

    impl FileStorage {
        pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
            Self {
                base_dir: base_dir.as_ref().to_path_buf(),
            }
        }

        /// Roots the store in the platform config directory for `namespace`
        /// (e.g. `"com.example.App"`). Returns `None` when the platform
        /// cannot report a home/config directory; callers then fall back to
        /// [`super::MemoryStorage`].
        pub fn for_namespace(namespace: &str) -> Option<Self> {
            let project = directories::ProjectDirs::from(namespace, "", "")?;
            Some(Self::new(project.config_dir().join("prefs")))
        }

        fn path_for(&self, key: &str) -> PathBuf {
            self.base_dir.join(key)
        }
    }

    fn write_atomic(path: &Path, value: &str) -> Result<(), std::io::Error> {
        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut tmp_file = tempfile::NamedTempFile::new_in(parent)?;
        tmp_file.write_all(value.as_bytes())?;
        tmp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    #[async_trait]
    impl StorageBackend for FileStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
            match tokio::fs::read_to_string(self.path_for(key)).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
            let path = self.path_for(key);
            let value = value.to_string();
            tokio::task::spawn_blocking(move || write_atomic(&path, &value))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
        }

        fn snapshot(&self, key: &str) -> Option<String> {
            std::fs::read_to_string(self.path_for(key)).ok()
        }

        fn describe(&self, key: &str) -> String {
            self.path_for(key).display().to_string()
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub mod wasm {
    use super::StorageBackend;
    use async_trait::async_trait;
    use web_sys::{window, Storage as WebStorage};

    /// Browser localStorage backend, prefixed per application so several
    /// apps on one origin do not trample each other's keys.
    #[derive(Debug)]
    pub struct LocalStorage {
        prefix: String,
    }

    impl LocalStorage {
        pub fn new(app_id: &str) -> Self {
            Self {
                prefix: format!(
                    "synced_prefs_{}_",
                    app_id.replace('/', "_").replace('.', "_")
                ),
            }
        }

        /// The prefix applied to every key. Needed to translate browser
        /// `storage` events back into scoped keys, see
        /// [`crate::invalidation::web::attach_storage_events`].
        pub fn key_prefix(&self) -> &str {
            &self.prefix
        }

        fn backing() -> Result<WebStorage, std::io::Error> {
            window()
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "window not available")
                })?
                .local_storage()
                .map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::Other, "localStorage not available")
                })?
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "localStorage is null")
                })
        }

        fn full_key(&self, key: &str) -> String {
            format!("{}{}", self.prefix, key)
        }
    }

    #[async_trait]
    impl StorageBackend for LocalStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
            let storage = Self::backing()?;
            storage.get_item(&self.full_key(key)).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::Other, "failed to read from localStorage")
            })
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
            let storage = Self::backing()?;
            storage.set_item(&self.full_key(key), value).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::Other, "failed to write to localStorage")
            })
        }

        fn snapshot(&self, key: &str) -> Option<String> {
            // localStorage reads are synchronous anyway.
            Self::backing().ok()?.get_item(&self.full_key(key)).ok()?
        }

        fn describe(&self, key: &str) -> String {
            format!("localStorage::{}", self.full_key(key))
        }
    }
}

/// Platform-appropriate persistent backend for `app_id`, chosen at startup.
///
/// Falls back to [`MemoryStorage`] (session-only values) when the platform
/// store is unavailable, which is the designed degraded behavior rather
/// than an error.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_storage(app_id: &str) -> std::sync::Arc<dyn StorageBackend> {
    match native::FileStorage::for_namespace(app_id) {
        Some(storage) => std::sync::Arc::new(storage),
        None => {
            tracing::warn!(
                app_id,
                "no config directory available, preferences are session-only"
            );
            std::sync::Arc::new(MemoryStorage::new())
        }
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub fn create_storage(app_id: &str) -> std::sync::Arc<dyn StorageBackend> {
    std::sync::Arc::new(wasm::LocalStorage::new(app_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("pref.theme.alice").await.unwrap(), None);

        storage.set("pref.theme.alice", "dark").await.unwrap();
        assert_eq!(
            storage.get("pref.theme.alice").await.unwrap(),
            Some("dark".to_string())
        );
        assert_eq!(
            storage.snapshot("pref.theme.alice"),
            Some("dark".to_string())
        );
    }

    #[tokio::test]
    async fn memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set("k", "light").await.unwrap();
        storage.set("k", "dark").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some("dark".to_string()));
    }
}
