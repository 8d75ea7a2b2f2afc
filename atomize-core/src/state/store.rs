//! Atom Store
//!
//! The store is the single mutable runtime behind every atom. It owns one
//! cell per atom, the dependency edges between them, the subscribers, and
//! the read scope used to discover edges.
//!
//! # How It Works
//!
//! 1. Reading an atom records the atom currently on top of the read scope
//!    (if any) as a dependent of the atom being read, then pushes the read
//!    atom and runs its production rule.
//!
//! 2. Writing an atom stores the value and starts propagation from it.
//!
//! 3. Propagation compares the new value with the last value subscribers
//!    were notified about. Equal values stop the cascade. Otherwise the
//!    subscribers run, and every dependent is re-read and propagated in
//!    turn, depth first, before `set` returns.
//!
//! Dependency edges are only ever added. A derived atom that stops reading
//! some atom keeps its edge and is merely re-evaluated for nothing; the
//! comparison in step 3 keeps that from reaching its subscribers.
//!
//! # Thread Safety
//!
//! The store is `Send + Sync` so it can live in a static and be handed to
//! other threads. The read scope is kept per thread, so concurrent reads
//! record the same edges they would record one after the other. Writes are
//! not batched or ordered across threads: two threads writing at once each
//! run their own cascade. No lock is held while production rules,
//! subscribers or update hooks run, so all of them may call back into the
//! store, and a subscriber is only dropped after the lock is released.
//!
//! A subscriber that captures a [`Store`] clone keeps the store alive for as
//! long as it stays registered. Capture a [`WeakStore`] instead if the
//! subscription is going to be detached.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::atom::{Atom, AtomKey, ErasedAtom};
use super::cell::{self, Cell, Value};
use super::scope::ReadScope;
use super::subscriber::{Subscriber, Subscription, SubscriptionId};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Runtime holding the state of every atom read or written through it.
///
/// Cloning a store is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    cells: Mutex<HashMap<AtomKey, Cell>>,
    scope: ReadScope,
}

impl StoreInner {
    pub(crate) fn has_subscriber(&self, key: AtomKey, id: SubscriptionId) -> bool {
        self.cells
            .lock()
            .get(&key)
            .is_some_and(|cell| cell.subscribers.contains_key(&id))
    }

    /// Returns `true` if the subscriber was still registered.
    pub(crate) fn remove_subscriber(&self, key: AtomKey, id: SubscriptionId) -> bool {
        let removed = self
            .cells
            .lock()
            .get_mut(&key)
            .and_then(|cell| cell.subscribers.shift_remove(&id));

        // The subscriber may own other subscriptions whose `Drop` locks the
        // cells again, so it must be dropped after the guard.
        let was_registered = removed.is_some();
        drop(removed);
        was_registered
    }
}

/// A non-owning handle to a [`Store`].
///
/// Subscribers that need the store should hold one of these rather than a
/// `Store` clone when their subscription may outlive every other handle.
#[derive(Clone, Default)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// The store, if any `Store` handle to it is still alive.
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Store {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                cells: Mutex::new(HashMap::new()),
                scope: ReadScope::default(),
            }),
        }
    }

    /// The process-wide default store.
    ///
    /// Only a convenience for applications that want a single ambient store;
    /// everything else in this crate takes a store explicitly.
    pub fn shared() -> &'static Store {
        static SHARED: OnceLock<Store> = OnceLock::new();
        SHARED.get_or_init(Store::new)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// A handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Read the current value of an atom.
    ///
    /// If called from inside another atom's production rule, that atom is
    /// recorded as a dependent of `atom`.
    ///
    /// # Panics
    ///
    /// Panics with [`StoreError::Cycle`] if `atom` is already being
    /// evaluated and cycle detection is enabled. A panic raised by a
    /// production rule propagates unchanged.
    pub fn get<T>(&self, atom: &Atom<T>) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.track_read(atom);

        let _guard = self.inner.scope.enter(atom.erased());
        atom.produce(self)
    }

    /// Write a value to an atom and propagate the change.
    ///
    /// All affected subscribers have run by the time this returns.
    pub fn set<T>(&self, atom: &Atom<T>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = atom.key();
        let value = Arc::new(value);
        let erased: Value = value.clone();

        let previous = self
            .inner
            .cells
            .lock()
            .entry(key)
            .or_insert_with(|| Cell::new(atom.comparator()))
            .value
            .replace(erased.clone());
        drop(previous);

        trace!(atom = %key, label = atom.label(), "set");
        atom.run_update_hook(&value);

        self.propagate(key, erased, 0);
    }

    /// Replace an atom's value with `f` applied to the current one.
    pub fn update<T, F>(&self, atom: &Atom<T>, f: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let current = self.get(atom);
        self.set(atom, f(&current));
    }

    /// Register `subscriber` to run whenever `atom` changes.
    ///
    /// The atom is read once first so that its dependencies are known and
    /// writes to them reach it.
    ///
    /// The store keeps `subscriber` until the returned handle is disposed or
    /// dropped. After [`Subscription::detach`] it is kept for the life of the
    /// store, so a detached subscriber must not hold a `Store` clone: the two
    /// would keep each other alive. Use [`Store::downgrade`] there.
    pub fn subscribe<T, S>(&self, atom: &Atom<T>, subscriber: S) -> Subscription
    where
        T: Clone + Send + Sync + 'static,
        S: Subscriber + 'static,
    {
        let key = atom.key();
        let _ = self.get(atom);

        let id = SubscriptionId::new();
        self.inner
            .cells
            .lock()
            .entry(key)
            .or_insert_with(|| Cell::new(atom.comparator()))
            .subscribers
            .insert(id, Arc::new(subscriber));

        debug!(atom = %key, label = atom.label(), subscription = ?id, "subscribed");
        Subscription::new(Arc::downgrade(&self.inner), key, id)
    }

    /// Number of atoms this store holds a cell for.
    pub fn cell_count(&self) -> usize {
        self.inner.cells.lock().len()
    }

    /// Keys of the atoms recorded as reading `atom`, in discovery order.
    pub fn dependents_of<T>(&self, atom: &Atom<T>) -> Vec<AtomKey>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner
            .cells
            .lock()
            .get(&atom.key())
            .map(|cell| cell.dependents.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count<T>(&self, atom: &Atom<T>) -> usize
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner
            .cells
            .lock()
            .get(&atom.key())
            .map_or(0, |cell| cell.subscribers.len())
    }

    /// The atom whose production rule is currently running, if any.
    pub fn current_reader(&self) -> Option<AtomKey> {
        self.inner.scope.top().map(|atom| atom.key())
    }

    pub(crate) fn read_primitive<T>(&self, atom: &Atom<T>, default: &T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = atom.key();
        let mut cells = self.inner.cells.lock();
        let cell = cells
            .entry(key)
            .or_insert_with(|| Cell::new(atom.comparator()));
        let value = cell
            .value
            .get_or_insert_with(|| Arc::new(default.clone()) as Value);

        cell::downcast::<T>(key, value.as_ref()).clone()
    }

    /// Make sure `atom` has a cell and record the current reader, if any, as
    /// its dependent.
    fn track_read<T>(&self, atom: &Atom<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = atom.key();
        let scope = &self.inner.scope;

        if self.inner.config.detect_cycles && scope.contains(key) {
            panic!(
                "{}",
                StoreError::Cycle {
                    key,
                    path: scope.path().into(),
                }
            );
        }

        let reader = scope.top();
        let mut cells = self.inner.cells.lock();
        let cell = cells
            .entry(key)
            .or_insert_with(|| Cell::new(atom.comparator()));

        if let Some(reader) = reader {
            let reader_key = reader.key();
            // A rule reading its own atom only gets this far with cycle
            // detection off.
            if reader_key != key && cell.add_dependent(reader) {
                trace!(atom = %key, dependent = %reader_key, "dependency recorded");
            }
        }
    }

    fn propagate(&self, key: AtomKey, value: Value, depth: usize) {
        if let Some(limit) = self.inner.config.max_propagation_depth {
            if depth > limit {
                panic!("{}", StoreError::PropagationDepth { key, limit });
            }
        }

        let subscribers: SmallVec<[(SubscriptionId, Arc<dyn Subscriber>); 4]> = {
            let mut cells = self.inner.cells.lock();
            let Some(cell) = cells.get_mut(&key) else {
                return;
            };

            cell.value = Some(Arc::clone(&value));
            if !cell.memorize(&value) {
                debug!(atom = %key, depth, "unchanged, propagation stopped");
                return;
            }

            cell.subscribers
                .iter()
                .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
                .collect()
        };

        trace!(atom = %key, depth, subscribers = subscribers.len(), "changed");

        for (id, subscriber) in subscribers {
            // Skip subscribers disposed by an earlier one in this loop.
            if self.inner.has_subscriber(key, id) {
                subscriber.receive_update();
            }
        }

        let dependents: Vec<Arc<dyn ErasedAtom>> = self
            .inner
            .cells
            .lock()
            .get(&key)
            .map(|cell| cell.dependents.values().cloned().collect())
            .unwrap_or_default();

        for dependent in dependents {
            let dependent_key = dependent.key();
            trace!(atom = %dependent_key, label = dependent.label(), source = %key, "re-evaluating");
            let next = dependent.evaluate(self);
            self.propagate(dependent_key, next, depth + 1);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.inner.config)
            .field("cell_count", &self.cell_count())
            .field("scope_depth", &self.inner.scope.depth())
            .finish()
    }
}
