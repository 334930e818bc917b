//! Per-identifier transition locks

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

/// Held for the duration of one transition
pub type KeyGuard = ArcMutexGuard<RawMutex, ()>;

/// Hands out one mutex per key so transitions on the same plugin id run one at a time
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock for `key` is free and take it
    pub fn lock(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock();
            // drop entries nobody holds or waits on
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_arc()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
