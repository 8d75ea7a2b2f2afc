//! Atom Handles
//!
//! An atom is an addressable unit of state. It carries no value of its own:
//! it is an identity plus a production rule, and every value it ever has
//! lives in the [`Store`] that reads it.
//!
//! # Kinds
//!
//! - A *primitive* atom has a default value. Reading it returns whatever the
//!   store holds for it, initializing the cell to the default on first read.
//!
//! - A *derived* atom has a function over the store. Reading it runs the
//!   function, and every atom the function reads records the derived atom as
//!   a dependent.
//!
//! # Identity
//!
//! Atoms are compared and hashed by their [`AtomKey`], never by value. Two
//! atoms built from the same default are different atoms; a clone of an atom
//! is the same atom.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::cell::{self, Comparator, Value};
use super::store::Store;

/// Unique identifier for an atom.
///
/// Allocated from a process-wide atomic counter when the atom is built.
/// Keys are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomKey(u64);

impl AtomKey {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw key value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type DeriveFn<T> = Arc<dyn Fn(&Store) -> T + Send + Sync>;
type UpdateHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

enum Rule<T> {
    Default(T),
    Derived(DeriveFn<T>),
}

impl<T: Clone> Clone for Rule<T> {
    fn clone(&self) -> Self {
        match self {
            Rule::Default(value) => Rule::Default(value.clone()),
            Rule::Derived(f) => Rule::Derived(Arc::clone(f)),
        }
    }
}

pub(crate) struct AtomInner<T> {
    key: AtomKey,
    rule: Rule<T>,
    eq: fn(&T, &T) -> bool,
    on_update: Option<UpdateHook<T>>,
    label: Option<Arc<str>>,
}

/// A handle to a unit of state of type `T`.
///
/// # Example
///
/// ```rust
/// use atomize_core::state::{Atom, Store};
///
/// let count = Atom::new(0);
/// let doubled = Atom::derived({
///     let count = count.clone();
///     move |store| store.get(&count) * 2
/// });
///
/// let store = Store::new();
/// store.set(&count, 21);
/// assert_eq!(store.get(&doubled), 42);
/// ```
pub struct Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<AtomInner<T>>,
}

impl<T> Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_rule(rule: Rule<T>, eq: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                key: AtomKey::next(),
                rule,
                eq,
                on_update: None,
                label: None,
            }),
        }
    }

    /// Create a primitive atom compared with `PartialEq`.
    pub fn new(default: T) -> Self
    where
        T: PartialEq,
    {
        Self::from_rule(Rule::Default(default), <T as PartialEq>::eq)
    }

    /// Create a primitive atom with a custom equality relation.
    pub fn new_with_eq(default: T, eq: fn(&T, &T) -> bool) -> Self {
        Self::from_rule(Rule::Default(default), eq)
    }

    /// Create a derived atom compared with `PartialEq`.
    ///
    /// The function must be pure over the store: its result may only depend
    /// on the atoms it reads through the `&Store` it is given.
    pub fn derived<F>(derive: F) -> Self
    where
        T: PartialEq,
        F: Fn(&Store) -> T + Send + Sync + 'static,
    {
        Self::from_rule(Rule::Derived(Arc::new(derive)), <T as PartialEq>::eq)
    }

    /// Create a derived atom with a custom equality relation.
    pub fn derived_with_eq<F>(derive: F, eq: fn(&T, &T) -> bool) -> Self
    where
        F: Fn(&Store) -> T + Send + Sync + 'static,
    {
        Self::from_rule(Rule::Derived(Arc::new(derive)), eq)
    }

    /// Attach a name shown in logs and `Debug` output.
    pub fn with_label(self, label: impl Into<Arc<str>>) -> Self {
        self.rebuild(|inner| inner.label = Some(label.into()))
    }

    /// Attach a hook that runs with the written value on every
    /// [`Store::set`] of this atom, before change propagation.
    ///
    /// Meant to be called while building the atom; clones taken earlier
    /// keep the previous (hook-less) behavior.
    pub fn with_on_update<F>(self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.rebuild(|inner| inner.on_update = Some(Arc::new(hook)))
    }

    fn rebuild(self, edit: impl FnOnce(&mut AtomInner<T>)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => AtomInner {
                key: shared.key,
                rule: shared.rule.clone(),
                eq: shared.eq,
                on_update: shared.on_update.clone(),
                label: shared.label.clone(),
            },
        };
        edit(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the atom's unique key.
    pub fn key(&self) -> AtomKey {
        self.inner.key
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Check whether this atom is computed from other atoms.
    pub fn is_derived(&self) -> bool {
        matches!(self.inner.rule, Rule::Derived(_))
    }

    /// Run the production rule against `store`.
    pub(crate) fn produce(&self, store: &Store) -> T {
        match &self.inner.rule {
            Rule::Default(default) => store.read_primitive(self, default),
            Rule::Derived(derive) => derive(store),
        }
    }

    /// Type-erased comparator for this atom's cell.
    pub(crate) fn comparator(&self) -> Comparator {
        cell::comparator_for(self.inner.key, self.inner.eq)
    }

    pub(crate) fn run_update_hook(&self, value: &T) {
        if let Some(hook) = &self.inner.on_update {
            hook(value);
        }
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedAtom> {
        Arc::clone(&self.inner) as Arc<dyn ErasedAtom>
    }
}

/// An atom with its value type erased.
///
/// The store keeps these in dependent sets and on the read scope so it can
/// re-evaluate any atom by key without knowing its type.
pub(crate) trait ErasedAtom: Send + Sync {
    fn key(&self) -> AtomKey;

    fn label(&self) -> Option<&str>;

    /// Read the atom through [`Store::get`] and box the result.
    fn evaluate(self: Arc<Self>, store: &Store) -> Value;
}

impl<T> ErasedAtom for AtomInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn key(&self) -> AtomKey {
        self.key
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn evaluate(self: Arc<Self>, store: &Store) -> Value {
        let atom = Atom { inner: self };
        Arc::new(store.get(&atom))
    }
}

impl<T> Clone for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.key == other.inner.key
    }
}

impl<T> Eq for Atom<T> where T: Clone + Send + Sync + 'static {}

impl<T> Hash for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl<T> fmt::Debug for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("key", &self.inner.key)
            .field("label", &self.inner.label)
            .field("derived", &self.is_derived())
            .finish()
    }
}
