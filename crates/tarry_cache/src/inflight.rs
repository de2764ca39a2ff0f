//! Deduplication of concurrent computations sharing one key.
//!
//! The first caller for a key becomes the leader and runs the computation;
//! callers arriving while it runs block until the leader publishes its
//! outcome and then share it.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Outcome a follower receives from a leader that panicked.
const LEADER_PANICKED: &str = "leader panicked before publishing a result";

/// Error returned by [`InFlightRegistry::run`].
#[derive(Debug)]
pub enum JoinError<E> {
    /// This caller ran the computation and it failed.
    Own(E),
    /// Another caller ran the computation and it failed with this message.
    Leader(String),
}

impl<E: fmt::Display> fmt::Display for JoinError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Own(e) => write!(f, "{e}"),
            JoinError::Leader(reason) => write!(f, "concurrent execution failed: {reason}"),
        }
    }
}

struct Slot<T> {
    outcome: Mutex<Option<Result<T, String>>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }
}

/// Registry of computations currently running, keyed by `K`.
pub struct InFlightRegistry<K, T> {
    slots: Mutex<HashMap<K, Arc<Slot<T>>>>,
}

impl<K: Eq + Hash + Clone, T: Clone> InFlightRegistry<K, T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of computations currently running.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns `true` if nothing is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `compute` unless a computation for `key` is already running, in
    /// which case this waits for and shares that computation's outcome.
    ///
    /// The slot is released when the leader finishes, including by panic.
    pub fn run<E, F>(&self, key: K, compute: F) -> Result<T, JoinError<E>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let (slot, leader) = {
            let mut slots = self.slots.lock();
            match slots.get(&key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(Slot::new());
                    slots.insert(key.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !leader {
            return wait_for(&slot);
        }

        let mut guard = LeaderGuard {
            slots: &self.slots,
            key,
            slot: &slot,
            outcome: None,
        };
        let result = compute();
        guard.outcome = Some(match &result {
            Ok(value) => Ok(value.clone()),
            Err(e) => Err(e.to_string()),
        });
        drop(guard);
        result.map_err(JoinError::Own)
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Default for InFlightRegistry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_for<T: Clone, E>(slot: &Slot<T>) -> Result<T, JoinError<E>> {
    let mut outcome = slot.outcome.lock();
    loop {
        if let Some(published) = outcome.as_ref() {
            return published.clone().map_err(JoinError::Leader);
        }
        slot.ready.wait(&mut outcome);
    }
}

/// Publishes the leader's outcome and frees the key on drop.
struct LeaderGuard<'a, K: Eq + Hash, T> {
    slots: &'a Mutex<HashMap<K, Arc<Slot<T>>>>,
    key: K,
    slot: &'a Slot<T>,
    outcome: Option<Result<T, String>>,
}

impl<K: Eq + Hash, T> Drop for LeaderGuard<'_, K, T> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err(LEADER_PANICKED.to_string()));
        self.slots.lock().remove(&self.key);
        *self.slot.outcome.lock() = Some(outcome);
        self.slot.ready.notify_all();
    }
}
