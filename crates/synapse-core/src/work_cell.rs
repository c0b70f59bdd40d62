//! Lazily built, lock-guarded, invalidate-on-mutation cache cell.
//!
//! [`WorkCell`] backs the per-expression WorkData. The value is `None` until
//! first access, built at most once per generation under the cell's build
//! mutex (double-checked), and reset by [`WorkCell::clear`] when the owning
//! neuron's links change.
//!
//! Readers never take the build mutex. A reader that raced a `clear` may
//! still be using the previous `Arc`; it stays valid until dropped and is
//! never observed half-populated because the slot is assigned only after the
//! value is complete.
//!
//! Every `clear` bumps a generation counter. A build only publishes its
//! result if no `clear` happened since it started; otherwise it runs again
//! against the current state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::neuron::{read, write};

pub struct WorkCell<T: ?Sized> {
    slot: RwLock<Option<Arc<T>>>,
    build: Mutex<()>,
    generation: AtomicU64,
}

impl<T: ?Sized> WorkCell<T> {
    pub fn new() -> Self {
        WorkCell {
            slot: RwLock::new(None),
            build: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// The current value, if built.
    pub fn get(&self) -> Option<Arc<T>> {
        read(&self.slot).clone()
    }

    /// Returns the cached value, building it with `build` on first access.
    ///
    /// `build` may run more than once if the cell is cleared while it runs.
    pub fn get_or_build<F>(&self, build: F) -> Arc<T>
    where
        F: Fn() -> Arc<T>,
    {
        if let Some(value) = self.get() {
            return value;
        }
        let _guard = self.build.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            // Lost the race: another thread built it while we waited.
            if let Some(value) = self.get() {
                return value;
            }
            let started = self.generation.load(Ordering::Acquire);
            let value = build();
            let mut slot = write(&self.slot);
            if self.generation.load(Ordering::Acquire) == started {
                *slot = Some(Arc::clone(&value));
                return value;
            }
        }
    }

    /// Drops the cached value; the next access rebuilds it, and a build in
    /// progress is discarded.
    pub fn clear(&self) {
        let mut slot = write(&self.slot);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *slot = None;
    }

    /// Number of `clear` calls so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        read(&self.slot).is_some()
    }
}

impl<T: ?Sized> Default for WorkCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for WorkCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkCell")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
