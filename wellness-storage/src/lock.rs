//! Lock access helpers.
//!
//! The ledger and the cache are bookkeeping that must never fail a caller,
//! so a poisoned lock is recovered instead of propagated.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Acquire a read lock, recovering from poisoning.
pub(crate) fn read_lock<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = name, "Lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning.
pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    name: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = name, "Lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = Arc::new(RwLock::new(1u32));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        *write_lock(&lock, "test") += 1;
        assert_eq!(*read_lock(&lock, "test"), 2);
    }
}
