//! Integration Tests for the Atom Store
//!
//! These tests verify that atoms, the store, and subscriptions work together
//! correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use atomize_core::persist::{MemoryStore, Persisted};
use atomize_core::state::{Atom, Store};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn count_and_is_large() -> (Atom<i32>, Atom<bool>) {
    let count = Atom::new(0).with_label("count");
    let is_large = Atom::derived({
        let count = count.clone();
        move |store| store.get(&count) > 10
    })
    .with_label("is_large");
    (count, is_large)
}

/// Test that a derived atom reflects writes to the atom it reads.
#[test]
fn derived_atom_follows_its_source() {
    let store = Store::new();
    let (count, is_large) = count_and_is_large();

    assert!(!store.get(&is_large));
    store.set(&count, 233);
    assert!(store.get(&is_large));
}

/// The reference scenario: notifications only on real changes of the
/// derived value, and none after disposal.
#[test]
fn subscriber_sees_only_real_changes() {
    init_tracing();

    let store = Store::new();
    let (count, is_large) = count_and_is_large();
    let observed: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));

    let subscription = store.subscribe(&is_large, {
        let (store, is_large, observed) = (store.clone(), is_large.clone(), observed.clone());
        move || *observed.lock().unwrap() = Some(store.get(&is_large))
    });

    // The first value is always published.
    store.set(&count, 6);
    assert_eq!(observed.lock().unwrap().take(), Some(false));

    // The derived value did not change.
    store.set(&count, 7);
    assert_eq!(observed.lock().unwrap().take(), None);

    // The derived value changed.
    store.set(&count, 42);
    assert_eq!(observed.lock().unwrap().take(), Some(true));

    // Disposed subscriptions hear nothing.
    subscription.dispose();
    store.set(&count, 1);
    assert_eq!(observed.lock().unwrap().take(), None);
    assert!(!subscription.is_active());
}

/// Test that a derived value is recomputed from current state on every read.
#[test]
fn derived_value_is_always_current() {
    let store = Store::new();
    let a = Atom::new(1);
    let b = Atom::new(2);
    let sum = Atom::derived({
        let (a, b) = (a.clone(), b.clone());
        move |store| store.get(&a) + store.get(&b)
    });

    assert_eq!(store.get(&sum), 3);
    store.set(&a, 10);
    assert_eq!(store.get(&sum), 12);
    store.set(&b, -10);
    assert_eq!(store.get(&sum), 0);
    assert_eq!(store.get(&sum), 0);
}

/// Test that a cascade passes through derived atoms nobody subscribed to.
#[test]
fn cascade_through_unsubscribed_derived_atoms() {
    let store = Store::new();
    let base = Atom::new(1);
    let doubled = Atom::derived({
        let base = base.clone();
        move |store| store.get(&base) * 2
    });
    let plus_ten = Atom::derived({
        let doubled = doubled.clone();
        move |store| store.get(&doubled) + 10
    });

    let seen = Arc::new(AtomicI32::new(0));
    let _sub = store.subscribe(&plus_ten, {
        let (store, plus_ten, seen) = (store.clone(), plus_ten.clone(), seen.clone());
        move || seen.store(store.get(&plus_ten), Ordering::SeqCst)
    });

    store.set(&base, 5);
    assert_eq!(seen.load(Ordering::SeqCst), 20);

    store.set(&base, 10);
    assert_eq!(seen.load(Ordering::SeqCst), 30);
}

/// Test that an unchanged intermediate value stops the cascade.
#[test]
fn unchanged_intermediate_stops_cascade() {
    let store = Store::new();
    let base = Atom::new(0);
    let parity = Atom::derived({
        let base = base.clone();
        move |store| store.get(&base) % 2
    });
    let evaluations = Arc::new(AtomicI32::new(0));
    let label = Atom::derived({
        let (parity, evaluations) = (parity.clone(), evaluations.clone());
        move |store| {
            evaluations.fetch_add(1, Ordering::SeqCst);
            if store.get(&parity) == 0 { "even" } else { "odd" }
        }
    });

    let notified = Arc::new(AtomicI32::new(0));
    let _sub = store.subscribe(&label, {
        let notified = notified.clone();
        move || {
            notified.fetch_add(1, Ordering::SeqCst);
        }
    });
    let after_subscribe = evaluations.load(Ordering::SeqCst);

    store.set(&base, 1);
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // 3 has the same parity as 1: `label` is neither re-evaluated nor notified.
    store.set(&base, 3);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(evaluations.load(Ordering::SeqCst), after_subscribe + 1);
}

/// Test that disposing one subscription leaves the others alone.
#[test]
fn disposal_is_per_subscription() {
    let store = Store::new();
    let atom = Atom::new(0);
    let first = Arc::new(AtomicI32::new(0));
    let second = Arc::new(AtomicI32::new(0));

    let first_sub = store.subscribe(&atom, {
        let first = first.clone();
        move || {
            first.fetch_add(1, Ordering::SeqCst);
        }
    });
    let _second_sub = store.subscribe(&atom, {
        let second = second.clone();
        move || {
            second.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(store.subscriber_count(&atom), 2);

    store.set(&atom, 1);
    first_sub.dispose();
    first_sub.dispose();
    store.set(&atom, 2);

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(store.subscriber_count(&atom), 1);
}

/// Test that dropping the handle disposes, and detaching does not.
#[test]
fn drop_and_detach() {
    let store = Store::new();
    let atom = Atom::new(0);
    let count = Arc::new(AtomicI32::new(0));

    let notify = {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    };

    drop(store.subscribe(&atom, notify.clone()));
    assert_eq!(store.subscriber_count(&atom), 0);

    store.subscribe(&atom, notify).detach();
    assert_eq!(store.subscriber_count(&atom), 1);

    store.set(&atom, 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Test that a custom comparator decides what counts as a change.
#[test]
fn custom_comparator_controls_notification() {
    let store = Store::new();
    let reading = Atom::new_with_eq(20.0_f64, |a, b| (a - b).abs() < 0.5);
    let count = Arc::new(AtomicI32::new(0));

    let _sub = store.subscribe(&reading, {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    });

    store.set(&reading, 20.0);
    store.set(&reading, 20.2);
    store.set(&reading, 21.0);

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(store.get(&reading), 21.0);
}

/// Test that a persisted atom feeds derived atoms like any other.
#[test]
fn persisted_atom_participates_in_propagation() {
    let backend = Arc::new(MemoryStore::new());
    let volume = Persisted::new(backend.clone(), "volume").atom(3u8);
    let muted = Atom::derived({
        let volume = volume.clone();
        move |store| store.get(&volume) == 0
    });

    let store = Store::new();
    let flips = Arc::new(AtomicI32::new(0));
    let _sub = store.subscribe(&muted, {
        let flips = flips.clone();
        move || {
            flips.fetch_add(1, Ordering::SeqCst);
        }
    });

    store.set(&volume, 0);
    assert!(store.get(&muted));
    assert_eq!(flips.load(Ordering::SeqCst), 1);

    let reloaded = Persisted::new(backend, "volume").atom(3u8);
    assert_eq!(Store::new().get(&reloaded), 0);
}
