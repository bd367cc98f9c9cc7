//! Per-carrier exclusive locks for in-process stores.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use carrierwise_core::{CarrierId, StorageError};

/// Set of currently held carrier locks.
///
/// Holding carrier A never blocks carrier B. Waiters give up after `timeout`.
#[derive(Debug)]
pub struct CarrierLocks {
    held: Mutex<HashSet<CarrierId>>,
    released: Condvar,
    timeout: Duration,
}

impl CarrierLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Block until `carrier_id` is free, then take it.
    pub fn acquire(&self, carrier_id: CarrierId) -> Result<CarrierLockGuard<'_>, StorageError> {
        let deadline = Instant::now() + self.timeout;
        let mut held = self.held.lock().map_err(|_| StorageError::LockPoisoned)?;

        while held.contains(&carrier_id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(StorageError::LockTimeout(format!(
                    "carrier {carrier_id} still locked after {:?}",
                    self.timeout
                )));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| StorageError::LockPoisoned)?;
            held = guard;
        }

        held.insert(carrier_id);
        Ok(CarrierLockGuard {
            locks: self,
            carrier_id,
        })
    }

    pub fn is_held(&self, carrier_id: CarrierId) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&carrier_id))
            .unwrap_or(false)
    }
}

/// Releases the carrier lock on drop.
#[derive(Debug)]
pub struct CarrierLockGuard<'a> {
    locks: &'a CarrierLocks,
    carrier_id: CarrierId,
}

impl CarrierLockGuard<'_> {
    pub fn carrier_id(&self) -> CarrierId {
        self.carrier_id
    }
}

impl Drop for CarrierLockGuard<'_> {
    fn drop(&mut self) {
        // Release even if another holder panicked; the set itself stays consistent.
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.carrier_id);
        drop(held);
        self.locks.released.notify_all();
    }
}
