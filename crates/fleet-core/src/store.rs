//! Whole-file JSON persistence: each store is a single document guarded by
//! one mutex, written atomically via a sibling temp file + rename. Readers on
//! a missing or malformed file get the type's `Default`, logged as a warning
//! — a write still proceeds normally afterwards (potential data loss is the
//! accepted durability contract, see `SPEC_FULL.md` §7).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};

pub struct JsonStore<T> {
    path: PathBuf,
    inner: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: Default + Clone + Serialize + DeserializeOwned,
{
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = Self::read_or_default(&path);
        JsonStore {
            path,
            inner: Mutex::new(inner),
        }
    }

    fn read_or_default(path: &Path) -> T {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed store file, starting empty");
                    T::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read store file, starting empty");
                T::default()
            }
        }
    }

    /// A point-in-time clone of the document, for read-only callers (HTTP
    /// list endpoints) that don't need to mutate under the lock.
    pub fn snapshot(&self) -> T {
        self.inner.lock().expect("store mutex poisoned").clone()
    }

    /// Runs `f` against the document under the lock, then persists the
    /// mutated document before releasing the lock. `f` must not block on
    /// network I/O or another store's lock.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> CoreResult<R> {
        let mut guard = self.inner.lock().expect("store mutex poisoned");
        let result = f(&mut guard);
        self.persist(&guard)?;
        Ok(result)
    }

    fn persist(&self, value: &T) -> CoreResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| CoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(&tmp_path, &bytes).map_err(|source| CoreError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| CoreError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let store: JsonStore<HashMap<String, u32>> = JsonStore::open(&path);
        store
            .with_mut(|m| {
                m.insert("a".to_string(), 1);
            })
            .unwrap();

        let reopened: JsonStore<HashMap<String, u32>> = JsonStore::open(&path);
        assert_eq!(reopened.snapshot().get("a"), Some(&1));
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let store: JsonStore<HashMap<String, u32>> = JsonStore::open(&path);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn malformed_file_yields_default_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"not json").unwrap();
        let store: JsonStore<HashMap<String, u32>> = JsonStore::open(&path);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn write_is_atomic_no_tmp_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let store: JsonStore<HashMap<String, u32>> = JsonStore::open(&path);
        store.with_mut(|m| m.insert("x".into(), 1)).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
