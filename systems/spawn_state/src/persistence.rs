//! Key-value persistence surfaces for the spawn-state document.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// Failure reading or writing a persisted value.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Underlying I/O failed.
    #[error("persistence I/O failed for key `{key}`: {source}")]
    Io {
        /// Key being read or written.
        key: String,
        /// Original I/O error.
        #[source]
        source: io::Error,
    },
    /// The key cannot be mapped onto the backing store.
    #[error("key `{0}` is not valid for this store")]
    InvalidKey(String),
}

/// Minimal string key-value surface, comparable to a save-profile preference store.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replaces the value stored under `key`.
    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Removes the value stored under `key`; missing keys are not an error.
    fn delete(&mut self, key: &str) -> Result<(), PersistenceError>;
}

/// Volatile store keeping values in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let _ = self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistenceError> {
        let _ = self.values.remove(key);
        Ok(())
    }
}

/// Store writing one `<key>.json` file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| PersistenceError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| PersistenceError::Io {
                key: key.to_owned(),
                source,
            })
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_values() {
        let dir = TempDir::new().expect("temp dir");
        let mut store = FileStore::open(dir.path()).expect("store opens");

        assert_eq!(store.get("spawn_state").expect("read succeeds"), None);
        store.put("spawn_state", "{}").expect("write succeeds");
        assert_eq!(
            store.get("spawn_state").expect("read succeeds"),
            Some("{}".to_owned())
        );

        let reopened = FileStore::open(dir.path()).expect("store reopens");
        assert_eq!(
            reopened.get("spawn_state").expect("read succeeds"),
            Some("{}".to_owned())
        );
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::open(dir.path()).expect("store opens");
        assert!(matches!(
            store.get("../escape"),
            Err(PersistenceError::InvalidKey(_))
        ));
    }

    #[test]
    fn delete_ignores_missing_keys() {
        let mut store = MemoryStore::new();
        store.delete("absent").expect("delete succeeds");
        store.put("present", "1").expect("write succeeds");
        store.delete("present").expect("delete succeeds");
        assert_eq!(store.get("present").expect("read succeeds"), None);
    }
}
