//! Lock helpers that recover from poisoning instead of panicking.
//!
//! Feed state must stay readable even if another task panicked while holding
//! the lock; the recovered guard is surfaced with a structured warning.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(op, source, lock = "rwlock.read", "recovered a poisoned lock");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(op, source, lock = "rwlock.write", "recovered a poisoned lock");
        poisoned.into_inner()
    })
}
