//! Lock acquisition that survives poisoning.
//!
//! Controllers and stores keep their state behind `std::sync` locks. A panic
//! while a guard is held must not wedge the whole session, so every access goes
//! through these helpers, which log the poisoning and hand back the inner guard.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn report_poisoned(owner: &'static str, op: &'static str, lock_kind: &'static str) {
    warn!(
        owner,
        op,
        lock_kind,
        result = "poisoned_recovered",
        "Recovered from poisoned lock; state may predate a panic"
    );
}

pub(crate) fn read<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        report_poisoned(owner, op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn write<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        report_poisoned(owner, op, "rwlock.write");
        poisoned.into_inner()
    })
}

pub(crate) fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    owner: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        report_poisoned(owner, op, "mutex.lock");
        poisoned.into_inner()
    })
}
