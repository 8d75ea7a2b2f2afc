//! Atoms and the Store
//!
//! This module implements the reactive core: atom handles, the store that
//! holds their state, and the subscriptions that observe it.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An atom is an addressable unit of state. A primitive atom has a default
//! value; a derived atom computes its value from other atoms. Atoms hold no
//! state themselves, so the same atom can be used with any number of stores.
//!
//! ## Dependency Tracking
//!
//! Dependencies are discovered while reading. The store keeps a stack of the
//! atoms whose rules are running; every read records the atom on top of that
//! stack as a dependent of the atom being read.
//!
//! ## Propagation
//!
//! A write compares the new value with the last value subscribers saw. Only
//! a real change notifies subscribers and re-evaluates dependents, which then
//! go through the same comparison. One `set` resolves the whole cascade
//! synchronously.

mod atom;
mod cell;
mod scope;
mod store;
mod subscriber;

pub use atom::{Atom, AtomKey};
pub use store::{Store, WeakStore};
pub use subscriber::{Subscriber, Subscription, SubscriptionId};
