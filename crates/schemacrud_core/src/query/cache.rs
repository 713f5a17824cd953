//! Per-model compiled statement cache.
//!
//! # Invariants
//! - At most one successful compile per `ShapeKey`, also under concurrent misses.
//! - A failed compile caches nothing and leaves no empty slot behind; the
//!   next caller compiles again.
//! - Entries are never evicted. The key space is bounded by the distinct
//!   field-name combinations of the model, not by literal values.

use super::{CompiledStatement, ShapeKey};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Slot = Arc<OnceCell<Arc<CompiledStatement>>>;

/// Shape-keyed cache of compiled statements.
///
/// Lookups share a read lock. A miss publishes an empty per-key cell and
/// initializes it outside the map lock; concurrent callers for that key
/// block on the cell until the single compile finishes.
#[derive(Default)]
pub struct StatementCache {
    slots: RwLock<HashMap<ShapeKey, Slot>>,
    compiles: AtomicUsize,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached statement for `key`, running `compile` on first use.
    ///
    /// # Errors
    /// Propagates the error of `compile`; nothing is cached in that case.
    pub fn get_or_compile<E, F>(
        &self,
        key: &ShapeKey,
        compile: F,
    ) -> Result<Arc<CompiledStatement>, E>
    where
        F: FnOnce() -> Result<CompiledStatement, E>,
    {
        let slot = self.slot(key);
        let result = slot.get_or_try_init(|| {
            let compiled = compile()?;
            self.compiles.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(compiled))
        });
        match result {
            Ok(statement) => Ok(Arc::clone(statement)),
            Err(err) => {
                self.release_empty(key, &slot);
                Err(err)
            }
        }
    }

    /// Returns the cached statement without compiling.
    pub fn get(&self, key: &ShapeKey) -> Option<Arc<CompiledStatement>> {
        self.slots
            .read()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of successful compiles performed by this cache.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of map slots, including ones still being initialized.
    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    // Slots are only cloned under the read lock, so under the write lock a
    // count of two (map + caller) means nobody else is waiting on this cell.
    fn release_empty(&self, key: &ShapeKey, slot: &Slot) {
        let mut slots = self.slots.write();
        let idle = slots
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && held.get().is_none());
        if idle && Arc::strong_count(slot) == 2 {
            slots.remove(key);
        }
    }

    fn slot(&self, key: &ShapeKey) -> Slot {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}
