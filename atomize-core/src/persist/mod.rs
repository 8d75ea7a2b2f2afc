//! Persistent Defaults
//!
//! Backs a primitive atom with an external key-value store. The stored entry
//! is read once when the atom is built and becomes its default; every later
//! [`Store::set`](crate::state::Store::set) of the atom writes the new value
//! back.
//!
//! Persistence is best-effort. Read and write failures never reach the
//! caller of `set`: they are handed to a failure hook, which logs a warning
//! unless replaced.
//!
//! ```rust
//! use std::sync::Arc;
//! use atomize_core::persist::{MemoryStore, Persisted};
//! use atomize_core::state::Store;
//!
//! let backend = Arc::new(MemoryStore::new());
//! let volume = Persisted::new(backend.clone(), "volume").atom(5u8);
//!
//! let store = Store::new();
//! store.set(&volume, 8);
//!
//! let reloaded = Persisted::new(backend, "volume").atom(5u8);
//! assert_eq!(store.get(&reloaded), 8);
//! ```

mod backend;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::warn;

use crate::error::PersistError;
use crate::state::Atom;

pub use backend::{JsonFileStore, MemoryStore};

/// External storage addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read the entry under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Json>, PersistError>;

    /// Replace the entry under `key`.
    fn save(&self, key: &str, value: Json) -> Result<(), PersistError>;
}

/// Receives persistence failures.
pub type ErrorHook = Arc<dyn Fn(&PersistError) + Send + Sync>;

fn log_failure(err: &PersistError) {
    warn!(error = %err, "persistence failed");
}

/// Builder for atoms backed by a [`KeyValueStore`] entry.
pub struct Persisted {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    on_error: ErrorHook,
}

impl Persisted {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            on_error: Arc::new(log_failure),
        }
    }

    /// Replace the failure hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PersistError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }

    /// Build the atom.
    ///
    /// The entry is read now. If it is missing or cannot be decoded as `T`,
    /// the atom starts from `default`.
    pub fn atom<T>(self, default: T) -> Atom<T>
    where
        T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static,
    {
        let Self {
            backend,
            key,
            on_error,
        } = self;

        let initial = match load::<T>(backend.as_ref(), &key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                on_error(&err);
                default
            }
        };

        let label = format!("persisted:{key}");
        Atom::new(initial)
            .with_label(label)
            .with_on_update(move |value: &T| {
                if let Err(err) = save(backend.as_ref(), &key, value) {
                    on_error(&err);
                }
            })
    }
}

impl fmt::Debug for Persisted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted").field("key", &self.key).finish()
    }
}

fn load<T: DeserializeOwned>(
    backend: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PersistError> {
    let Some(json) = backend.load(key)? else {
        return Ok(None);
    };
    serde_json::from_value(json)
        .map(Some)
        .map_err(|source| PersistError::Decode {
            key: key.to_owned(),
            source,
        })
}

fn save<T: Serialize>(backend: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_value(value).map_err(|source| PersistError::Encode {
        key: key.to_owned(),
        source,
    })?;
    backend.save(key, json)
}
