use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Acquires a read guard, recovering the inner value if a writer panicked.
pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log_poisoned(source, op, "rwlock.read");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log_poisoned(source, op, "rwlock.write");
        poisoned.into_inner()
    })
}

fn log_poisoned(source: &'static str, op: &'static str, lock_kind: &'static str) {
    warn!(
        target: "sitecreator::cache",
        op,
        source,
        lock_kind,
        result = "poisoned_recovered",
        "Recovered from poisoned object cache lock; entries may be stale"
    );
}
