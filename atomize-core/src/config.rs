//! Store configuration.
//!
//! The defaults match the behavior most callers want: reading an atom that
//! is already being evaluated is reported as a cycle, and propagation depth
//! is only bounded by the stack.

use serde::{Deserialize, Serialize};

/// Runtime options for a [`Store`](crate::state::Store).
///
/// Deserializable so applications can embed it in their own config files;
/// missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Panic with [`StoreError::Cycle`](crate::error::StoreError::Cycle)
    /// when an atom is read while it is already on the read scope.
    ///
    /// When disabled, a cyclic rule recurses until the stack overflows.
    pub detect_cycles: bool,

    /// Upper bound on how many dependent levels a single `set` may cascade
    /// through. `None` leaves the cascade unbounded.
    pub max_propagation_depth: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_propagation_depth: None,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    pub fn with_max_propagation_depth(mut self, limit: usize) -> Self {
        self.max_propagation_depth = Some(limit);
        self
    }
}
