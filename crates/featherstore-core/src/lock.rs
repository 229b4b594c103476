//! Poisoned-lock recovery for embedded storage backends
//!
//! The SQLite-backed stores hold their connection behind a `Mutex` and the
//! catalog fronts its backend with `RwLock` caches. If a thread panics while
//! holding a lock, the lock is poisoned; the guarded data is still usable, so
//! we recover the guard rather than wedge every subsequent store operation.

use crate::Result;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Locks a mutex, recovering the guard if a previous holder panicked
pub fn recover_mutex<'a, T>(mutex: &'a Mutex<T>, owner: &str) -> Result<MutexGuard<'a, T>> {
    match mutex.lock() {
        Ok(guard) => Ok(guard),
        Err(poisoned) => {
            tracing::warn!(owner = owner, "recovering poisoned mutex");
            Ok(poisoned.into_inner())
        }
    }
}

/// Read-locks an `RwLock`, recovering the guard if a writer panicked
pub fn recover_read<'a, T>(lock: &'a RwLock<T>, owner: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(owner = owner, "recovering poisoned rwlock (read)");
            poisoned.into_inner()
        }
    }
}

/// Write-locks an `RwLock`, recovering the guard if a holder panicked
pub fn recover_write<'a, T>(lock: &'a RwLock<T>, owner: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(owner = owner, "recovering poisoned rwlock (write)");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recover_after_panic() {
        let mutex = Arc::new(Mutex::new(1u32));

        let m = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = m.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let guard = recover_mutex(&mutex, "test").unwrap();
        assert_eq!(*guard, 1);
    }
}
