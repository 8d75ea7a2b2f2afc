//! Error types.
//!
//! The store itself never returns errors: reading and writing atoms is
//! infallible for well-typed callers. `StoreError` describes the contract
//! violations that abort the current operation with a panic, and
//! `PersistError` is what key-value backends report to the persistence
//! failure hook.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::state::AtomKey;

/// Contract violations detected by the store.
///
/// These are raised as panics, never returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An atom was read while it was already being evaluated.
    #[error("dependency cycle detected while reading atom {key}: {path}")]
    Cycle {
        /// The atom that was read again.
        key: AtomKey,
        /// The read scope at the time of the read, outermost first.
        path: KeyPath,
    },

    /// A propagation cascade nested deeper than the configured limit.
    #[error("propagation exceeded the maximum depth of {limit} at atom {key}")]
    PropagationDepth { key: AtomKey, limit: usize },

    /// A type-erased value did not have the type its atom declares.
    #[error("type mismatch in cell {key}: expected a value of type `{expected}`")]
    TypeMismatch {
        key: AtomKey,
        expected: &'static str,
    },
}

/// A sequence of atoms, displayed as `#1 -> #2 -> #3`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPath(Vec<AtomKey>);

impl KeyPath {
    pub fn keys(&self) -> &[AtomKey] {
        &self.0
    }
}

impl From<Vec<AtomKey>> for KeyPath {
    fn from(keys: Vec<AtomKey>) -> Self {
        Self(keys)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Failures reported by a [`KeyValueStore`](crate::persist::KeyValueStore).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode the value stored under `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode the value stored under `{key}`")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o error on `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend failure for `{key}`: {reason}")]
    Backend { key: String, reason: String },
}
