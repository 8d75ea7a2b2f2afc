//! Read Scope
//!
//! The read scope tracks which atoms are currently being evaluated. This
//! enables automatic dependency discovery: when an atom is read, the atom on
//! top of the scope is the one whose rule asked for it.
//!
//! # Implementation
//!
//! The stacks live in thread-local storage, so two threads reading through
//! the same store never see each other's entries. Each store's scope has its
//! own ID and its own stack per thread. Entering an atom pushes it and
//! returns a guard; dropping the guard pops it again, including when the rule
//! panics. Nested derived atoms simply stack up.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use super::atom::{AtomKey, ErasedAtom};

type Stack = SmallVec<[Arc<dyn ErasedAtom>; 8]>;

thread_local! {
    /// Read scope stacks of the current thread, keyed by scope ID. Empty
    /// stacks are removed.
    static SCOPE_STACKS: RefCell<HashMap<u64, Stack>> = RefCell::new(HashMap::new());
}

pub(crate) struct ReadScope {
    id: u64,
}

impl Default for ReadScope {
    fn default() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl ReadScope {
    fn with_stack<R>(&self, f: impl FnOnce(Option<&Stack>) -> R) -> R {
        SCOPE_STACKS.with(|stacks| f(stacks.borrow().get(&self.id)))
    }

    /// Push `atom` and return a guard that pops it when dropped.
    pub(crate) fn enter(&self, atom: Arc<dyn ErasedAtom>) -> ScopeGuard<'_> {
        let key = atom.key();
        SCOPE_STACKS.with(|stacks| {
            stacks.borrow_mut().entry(self.id).or_default().push(atom);
        });
        ScopeGuard { scope: self, key }
    }

    /// The atom currently being evaluated on this thread, if any.
    pub(crate) fn top(&self) -> Option<Arc<dyn ErasedAtom>> {
        self.with_stack(|stack| stack.and_then(|stack| stack.last().cloned()))
    }

    pub(crate) fn contains(&self, key: AtomKey) -> bool {
        self.with_stack(|stack| {
            stack.is_some_and(|stack| stack.iter().any(|atom| atom.key() == key))
        })
    }

    /// Keys on this thread's scope, outermost first.
    pub(crate) fn path(&self) -> Vec<AtomKey> {
        self.with_stack(|stack| {
            stack
                .map(|stack| stack.iter().map(|atom| atom.key()).collect())
                .unwrap_or_default()
        })
    }

    pub(crate) fn depth(&self) -> usize {
        self.with_stack(|stack| stack.map_or(0, |stack| stack.len()))
    }

    fn pop(&self) -> Option<Arc<dyn ErasedAtom>> {
        SCOPE_STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            let stack = stacks.get_mut(&self.id)?;
            let popped = stack.pop();
            if stack.is_empty() {
                stacks.remove(&self.id);
            }
            popped
        })
    }
}

/// Pops its atom off the read scope when dropped.
pub(crate) struct ScopeGuard<'a> {
    scope: &'a ReadScope,
    key: AtomKey,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        // Dropped outside the thread-local borrow.
        let popped = self.scope.pop();

        if let Some(atom) = popped {
            debug_assert_eq!(
                atom.key(),
                self.key,
                "read scope mismatch: expected {}, got {}",
                self.key,
                atom.key()
            );
        }
    }
}
