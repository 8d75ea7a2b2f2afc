//! Internal Cells
//!
//! A cell is the store's private record for one atom. Values of every atom
//! type live side by side in one map, so a cell stores its value type-erased
//! and carries a comparator that was built where the concrete type was still
//! known.

use std::any::{self, Any};
use std::sync::Arc;

use indexmap::IndexMap;

use super::atom::{AtomKey, ErasedAtom};
use super::subscriber::{Subscriber, SubscriptionId};
use crate::error::StoreError;

pub(crate) type AnyValue = dyn Any + Send + Sync;

/// A type-erased atom value. Shared so the stored and memorized slots can
/// point at the same allocation.
pub(crate) type Value = Arc<AnyValue>;

pub(crate) type Comparator = Arc<dyn Fn(&AnyValue, &AnyValue) -> bool + Send + Sync>;

/// Downcast an erased value owned by the cell `key`.
///
/// # Panics
///
/// Panics with [`StoreError::TypeMismatch`] if the value is not a `T`.
pub(crate) fn downcast<T: 'static>(key: AtomKey, value: &AnyValue) -> &T {
    match value.downcast_ref::<T>() {
        Some(value) => value,
        None => panic!(
            "{}",
            StoreError::TypeMismatch {
                key,
                expected: any::type_name::<T>(),
            }
        ),
    }
}

/// Bind a typed equality relation into a comparator over erased values.
pub(crate) fn comparator_for<T: 'static>(key: AtomKey, eq: fn(&T, &T) -> bool) -> Comparator {
    Arc::new(move |lhs: &AnyValue, rhs: &AnyValue| {
        eq(downcast::<T>(key, lhs), downcast::<T>(key, rhs))
    })
}

pub(crate) struct Cell {
    /// Latest value written or propagated. Primitive cells are filled with
    /// their default on first read.
    pub(crate) value: Option<Value>,

    /// Last value subscribers were notified about.
    pub(crate) memorized: Option<Value>,

    pub(crate) comparator: Comparator,

    /// Atoms whose rule read this cell. Append-only.
    pub(crate) dependents: IndexMap<AtomKey, Arc<dyn ErasedAtom>>,

    pub(crate) subscribers: IndexMap<SubscriptionId, Arc<dyn Subscriber>>,
}

impl Cell {
    pub(crate) fn new(comparator: Comparator) -> Self {
        Self {
            value: None,
            memorized: None,
            comparator,
            dependents: IndexMap::new(),
            subscribers: IndexMap::new(),
        }
    }

    /// Record `dependent` as reading this cell. Returns `true` for a new edge.
    pub(crate) fn add_dependent(&mut self, dependent: Arc<dyn ErasedAtom>) -> bool {
        let key = dependent.key();
        if self.dependents.contains_key(&key) {
            return false;
        }
        self.dependents.insert(key, dependent);
        true
    }

    /// Memorize `value` unless it equals the memorized value.
    ///
    /// Returns `true` when the value counts as a change.
    pub(crate) fn memorize(&mut self, value: &Value) -> bool {
        if let Some(memorized) = &self.memorized {
            if (self.comparator)(value.as_ref(), memorized.as_ref()) {
                return false;
            }
        }
        self.memorized = Some(Arc::clone(value));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_cell() -> Cell {
        Cell::new(comparator_for::<i32>(AtomKey::from_raw(7), |l, r| l == r))
    }

    #[test]
    fn first_value_is_always_a_change() {
        let mut cell = int_cell();
        assert!(cell.memorize(&(Arc::new(3) as Value)));
    }

    #[test]
    fn equal_values_are_suppressed() {
        let mut cell = int_cell();
        cell.memorize(&(Arc::new(3) as Value));

        assert!(!cell.memorize(&(Arc::new(3) as Value)));
        assert!(cell.memorize(&(Arc::new(4) as Value)));
        assert!(cell.memorize(&(Arc::new(3) as Value)));
    }

    #[test]
    fn downcast_returns_typed_reference() {
        let value: Value = Arc::new(String::from("hi"));
        assert_eq!(downcast::<String>(AtomKey::from_raw(1), value.as_ref()), "hi");
    }

    #[test]
    #[should_panic(expected = "type mismatch in cell #9")]
    fn downcast_to_wrong_type_panics() {
        let value: Value = Arc::new(1u8);
        downcast::<String>(AtomKey::from_raw(9), value.as_ref());
    }
}
