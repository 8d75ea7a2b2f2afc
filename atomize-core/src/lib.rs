//! Atomize Core
//!
//! This crate provides a fine-grained reactive state container. It
//! implements:
//!
//! - Atoms: independently addressable state cells, primitive or derived
//! - Automatic dependency discovery while derived atoms are read
//! - Memoized change detection, so unchanged values notify nobody
//! - Eager, synchronous propagation to subscribers after every write
//! - Optional persistence of primitive atoms in a key-value store
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `state`: atoms, the store, and subscriptions
//! - `persist`: key-value backed atoms
//! - `config`: store options
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use atomize_core::state::{Atom, Store};
//!
//! let count = Atom::new(0);
//! let is_large = Atom::derived({
//!     let count = count.clone();
//!     move |store| store.get(&count) > 10
//! });
//!
//! let store = Store::new();
//! let changes = Arc::new(AtomicUsize::new(0));
//! let _subscription = store.subscribe(&is_large, {
//!     let changes = changes.clone();
//!     move || {
//!         changes.fetch_add(1, Ordering::SeqCst);
//!     }
//! });
//!
//! store.set(&count, 6);   // is_large: false (first notification)
//! store.set(&count, 7);   // still false, nobody is notified
//! store.set(&count, 42);  // is_large: true
//! assert_eq!(changes.load(Ordering::SeqCst), 2);
//! ```

pub mod config;
pub mod error;
pub mod persist;
pub mod state;

pub use config::StoreConfig;
pub use error::{KeyPath, PersistError, StoreError};
pub use state::{Atom, AtomKey, Store, Subscription, WeakStore};
