//! Key-value backends.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value as Json};

use super::KeyValueStore;
use crate::error::PersistError;

/// In-process backend. Useful in tests and as a scratch store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Json>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Json>, PersistError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: Json) -> Result<(), PersistError> {
        self.entries.write().insert(key.to_owned(), value);
        Ok(())
    }
}

/// Backend keeping every entry in one JSON object on disk.
///
/// The file is read once when the store is opened and rewritten in full on
/// every save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Json>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| PersistError::Decode {
                key: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(PersistError::Io { path, source }),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Json>, PersistError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: Json) -> Result<(), PersistError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_owned(), value);

        let text = serde_json::to_string_pretty(&*entries).map_err(|source| {
            PersistError::Encode {
                key: key.to_owned(),
                source,
            }
        })?;
        fs::write(&self.path, text).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
