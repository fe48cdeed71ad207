use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), "rwlock.read", op)
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), "rwlock.write", op)
}

/// A panic while holding the L1 lock leaves the map usable; entries still
/// carry their own write time, so staleness stays bounded by the TTL.
fn recover<G>(result: LockResult<G>, lock_kind: &'static str, op: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            target = "atrium::cache::lock",
            op,
            lock_kind,
            result = "poisoned_recovered",
            "Recovered from poisoned L1 cache lock"
        );
        poisoned.into_inner()
    })
}
