//! Per-name install locks.
//!
//! Two mutations of the same library name must not interleave their
//! directory deletion and creation. `NameLocks` hands out one guard per name
//! at a time; installs of different names proceed in parallel.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Set of library names with an in-flight mutation.
#[derive(Debug, Default)]
pub struct NameLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `name` is free, then hold it until the guard is dropped.
    pub fn acquire(&self, name: &str) -> NameGuard<'_> {
        let mut held = self.lock();
        while held.contains(name) {
            debug!("Waiting for in-flight operation on {}", name);
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(name.to_string());

        NameGuard {
            locks: self,
            name: name.to_string(),
        }
    }

    /// Whether an operation currently holds `name`.
    pub fn is_held(&self, name: &str) -> bool {
        self.lock().contains(name)
    }
}

/// Exclusive hold on one library name. Released on drop.
#[derive(Debug)]
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
}

impl NameGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.name);
        self.locks.released.notify_all();
    }
}
