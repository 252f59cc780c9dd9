use fs2::FileExt;
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key/value persistence for client-side view state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

fn lock_values<V>(values: &Mutex<V>) -> MutexGuard<'_, V> {
    match values.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = values
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_values(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock_values(&self.values).insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON object on disk. Read once on open, rewritten atomically on every set.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(err) => {
                    warn!(event = "store_parse_error", path = %path.display(), error = %err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = sibling_path(&self.path, "lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let payload = serde_json::to_string_pretty(values)?;
        let temp_path = sibling_path(&self.path, "tmp");
        let written = std::fs::write(&temp_path, payload)
            .and_then(|_| std::fs::rename(&temp_path, &self.path));
        let _ = lock_file.unlock();
        written?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock_values(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = lock_values(&self.values);
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.{suffix}", name.to_string_lossy())),
        None => path.with_extension(suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("view-state.json");

        let store = FileStore::open(&path).expect("open");
        assert_eq!(store.get("sysmon.pageSize.services"), None);
        store
            .set("sysmon.pageSize.services", "50")
            .expect("persist");
        drop(store);

        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.get("sysmon.pageSize.services").as_deref(),
            Some("50")
        );
        assert!(!dir.path().join("nested").join("view-state.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("view-state.json");
        std::fs::write(&path, "{not json").expect("write");

        let store = FileStore::open(&path).expect("open");
        assert_eq!(store.get("anything"), None);
        store.set("k", "v").expect("overwrite");
        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.contains("\"k\""));
    }

    #[test]
    fn memory_store_counts_writes() {
        let store = MemoryStore::with_values([("a", "1")]);
        assert_eq!(store.get("a").as_deref(), Some("1"));
        store.set("a", "2").expect("set");
        store.set("b", "3").expect("set");
        assert_eq!(store.write_count(), 2);
    }
}
