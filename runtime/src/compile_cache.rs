//! Per-backend compile cache.
//!
//! Maps [`FunctionId`] to the executable compiled for that function, using
//! papaya's lock-free HashMap for thread-safe access.
//!
//! # Single compilation
//!
//! Each key owns a slot (`OnceCell`) that is claimed atomically before any
//! compilation work starts. The thread that initializes the slot is the only
//! one that lowers the function; concurrent callers for the same function
//! block on the slot and receive the same `Arc<Executable>`. Callers for
//! different functions never wait on each other.
//!
//! A failed compilation leaves its slot empty, so the next call retries. The
//! failing thread drops the empty slot again unless another caller holds it.

use std::sync::Arc;

use kiln_ir::{Function, FunctionId};
use once_cell::sync::OnceCell;
use papaya::{Compute, HashMap, Operation};
use tracing::debug;

use crate::error::Result;
use crate::executable::Executable;

type Slot = Arc<OnceCell<Arc<Executable>>>;

#[derive(Default)]
pub struct CompileCache {
    slots: HashMap<FunctionId, Slot>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached executable for `function`, compiling it on first use.
    ///
    /// `compile` runs at most once per successful cache entry.
    pub fn get_or_compile<F>(&self, function: &Function, compile: F) -> Result<Arc<Executable>>
    where
        F: FnOnce() -> Result<Executable>,
    {
        let slot = {
            let guard = self.slots.guard();
            Arc::clone(self.slots.get_or_insert_with(function.id(), || Arc::new(OnceCell::new()), &guard))
        };

        if let Some(cached) = slot.get() {
            debug!(function = function.name(), id = %function.id(), "compile cache hit");
            return Ok(Arc::clone(cached));
        }

        let compiled = slot
            .get_or_try_init(|| {
                debug!(function = function.name(), id = %function.id(), "compile cache miss");
                compile().map(Arc::new)
            })
            .cloned();
        if compiled.is_err() {
            self.discard_empty(function, &slot);
        }
        compiled
    }

    /// Remove `slot` if it is still empty and only the map and the caller hold it.
    fn discard_empty(&self, function: &Function, slot: &Slot) {
        let guard = self.slots.guard();
        let result = self.slots.compute(
            function.id(),
            |entry| match entry {
                Some((_, current))
                    if Arc::ptr_eq(current, slot) && current.get().is_none() && Arc::strong_count(slot) == 2 =>
                {
                    Operation::Remove
                }
                _ => Operation::Abort(()),
            },
            &guard,
        );

        if matches!(result, Compute::Removed(..)) {
            debug!(function = function.name(), "dropped slot of failed compile");
        }
    }

    /// Number of slots in the map, including ones still being compiled.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Executable cached for `function`, if compiled.
    pub fn get(&self, function: &Function) -> Option<Arc<Executable>> {
        let guard = self.slots.guard();
        self.slots.get(&function.id(), &guard).and_then(|slot| slot.get().cloned())
    }

    /// Evict `executable` if it is the one cached for its function.
    ///
    /// Returns whether an entry was removed; evicting anything else is a no-op.
    pub fn remove(&self, executable: &Arc<Executable>) -> bool {
        let guard = self.slots.guard();
        let result = self.slots.compute(
            executable.function().id(),
            |entry| match entry {
                Some((_, slot)) if slot.get().is_some_and(|cached| Arc::ptr_eq(cached, executable)) => {
                    Operation::Remove
                }
                _ => Operation::Abort(()),
            },
            &guard,
        );

        let removed = matches!(result, Compute::Removed(..));
        if removed {
            debug!(function = executable.function().name(), "evicted compiled function");
        }
        removed
    }

    /// Number of compiled entries.
    pub fn len(&self) -> usize {
        let guard = self.slots.guard();
        self.slots.iter(&guard).filter(|(_, slot)| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let guard = self.slots.guard();
        self.slots.clear(&guard);
    }
}

impl std::fmt::Debug for CompileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileCache").field("entries", &self.len()).finish()
    }
}
