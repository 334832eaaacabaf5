//! Shared id-to-resource registries.
//!
//! Figures and module slots are handed out by numeric handle. Handles start
//! at 1 and are never reused within a process lifetime, so a stale handle can
//! never alias a newer resource.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Thread-safe map of monotonically assigned ids to values.
#[derive(Debug)]
pub(crate) struct Registry<T> {
    inner: Mutex<RegistryState<T>>,
}

#[derive(Debug)]
struct RegistryState<T> {
    entries: BTreeMap<u32, T>,
    next_id: u32,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                entries: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a value and returns its freshly assigned id.
    pub(crate) fn register(&self, value: T) -> u32 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.insert(id, value);
        id
    }

    /// Runs `operation` against the entry, when present.
    pub(crate) fn with<R>(&self, id: u32, operation: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.lock();
        state.entries.get(&id).map(operation)
    }

    /// Runs `operation` against the entry mutably, when present.
    pub(crate) fn with_mut<R>(&self, id: u32, operation: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.lock();
        state.entries.get_mut(&id).map(operation)
    }

    /// Removes the entry, returning it when it existed.
    pub(crate) fn release(&self, id: u32) -> Option<T> {
        self.lock().entries.remove(&id)
    }

    /// Removes every entry without disturbing the id counter.
    pub(crate) fn release_all(&self) {
        self.lock().entries.clear();
    }

    /// Ids currently registered, in ascending order.
    pub(crate) fn ids(&self) -> Vec<u32> {
        self.lock().entries.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_are_never_reused() {
        let registry = Registry::new();
        let first = registry.register("a");
        let second = registry.register("b");
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        assert_eq!(registry.release(first), Some("a"));
        assert_eq!(registry.register("c"), 3);
    }

    #[test]
    fn release_all_keeps_the_counter() {
        let registry = Registry::new();
        registry.register(1);
        registry.register(2);
        registry.release_all();
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.register(3), 3);
    }

    #[test]
    fn with_mut_updates_in_place() {
        let registry = Registry::new();
        let id = registry.register(10);
        registry.with_mut(id, |value| *value += 5);
        assert_eq!(registry.with(id, |value| *value), Some(15));
    }

    #[test]
    fn missing_ids_yield_none() {
        let registry: Registry<u32> = Registry::new();
        assert_eq!(registry.with(7, |value| *value), None);
        assert_eq!(registry.release(7), None);
    }
}
