//! Subscriber types for the store.
//!
//! A subscriber is anything that wants to hear about an atom changing. It is
//! called with no arguments; it reads whatever it needs back from the store.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use tracing::debug;

use super::atom::AtomKey;
use super::store::StoreInner;

/// Unique identifier for a subscription.
///
/// Two subscriptions of the same observer to the same atom get different
/// IDs, so disposing one never affects the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// An observer of atom changes.
///
/// Implemented for every `Fn() + Send + Sync` closure, so most callers
/// subscribe with a closure.
pub trait Subscriber: Send + Sync {
    /// Called after the observed atom changed.
    fn receive_update(&self);
}

impl<F> Subscriber for F
where
    F: Fn() + Send + Sync,
{
    fn receive_update(&self) {
        self()
    }
}

/// Handle to a registered subscriber.
///
/// Dropping this handle disposes the subscription. Use [`detach`] to keep
/// the subscriber registered for as long as the store lives.
///
/// [`detach`]: Subscription::detach
#[must_use = "dropping a Subscription disposes it immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    key: AtomKey,
    id: SubscriptionId,
}

impl Subscription {
    pub(crate) fn new(store: Weak<StoreInner>, key: AtomKey, id: SubscriptionId) -> Self {
        Self { store, key, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Key of the observed atom.
    pub fn key(&self) -> AtomKey {
        self.key
    }

    /// Check whether the subscriber is still registered.
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.has_subscriber(self.key, self.id))
    }

    /// Remove the subscriber from the store.
    ///
    /// Calling this more than once, or after the store is gone, does nothing.
    pub fn dispose(&self) {
        if let Some(store) = self.store.upgrade() {
            if store.remove_subscriber(self.key, self.id) {
                debug!(atom = %self.key, subscription = ?self.id, "subscription disposed");
            }
        }
    }

    /// Give up the handle without disposing the subscription.
    ///
    /// The subscriber then lives as long as the store. If it holds a
    /// [`Store`](super::Store) clone, neither is ever freed; hold a
    /// [`WeakStore`](super::WeakStore) from [`Store::downgrade`](super::Store::downgrade)
    /// instead.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn subscription_ids_are_unique() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        let id3 = SubscriptionId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn closures_are_subscribers() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let subscriber: Arc<dyn Subscriber> = Arc::new(move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        subscriber.receive_update();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn orphaned_handle_is_inert() {
        let handle = Subscription::new(Weak::new(), AtomKey::from_raw(1), SubscriptionId::new());

        assert!(!handle.is_active());
        handle.dispose();
        handle.dispose();
    }
}
