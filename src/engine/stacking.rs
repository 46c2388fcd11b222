//! Stacking-flavor acquire and release.

use super::blocks;
use crate::{
    ConflictStatus, HandleId, LockError, LockFlavor, LockList, LockRange, LockRecord,
    OwnerContext,
};

/// Append `plock` unless some record, of either flavor, blocks it.
pub(crate) fn acquire(
    list: &LockList,
    plock: &LockRecord,
    previous_failure: Option<&LockRecord>,
    conflict_offset: u64,
) -> Result<LockList, LockError> {
    if let Some(blocker) = list.iter().find(|ex| blocks(ex, plock)) {
        return Err(LockError::Conflict {
            blocker: *blocker,
            self_blocked: blocker.owner == plock.owner,
            status: failure_status(plock, previous_failure, conflict_offset),
        });
    }
    let mut next = list.clone();
    next.push(*plock);
    Ok(next)
}

/// Status to report for a refused stacking lock.
///
/// High offsets (top bit clear) and a retry of the same start through the
/// same handle report `FileLockConflict`; a first refusal reports
/// `LockNotGranted`.
pub(crate) fn failure_status(
    plock: &LockRecord,
    previous_failure: Option<&LockRecord>,
    conflict_offset: u64,
) -> ConflictStatus {
    let start = plock.range.start;
    if start >= conflict_offset && start >> 63 == 0 {
        return ConflictStatus::FileLockConflict;
    }
    let repeated = previous_failure.is_some_and(|prev| {
        prev.owner.same_session(&plock.owner)
            && prev.handle == plock.handle
            && prev.range.start == start
    });
    if repeated {
        ConflictStatus::FileLockConflict
    } else {
        ConflictStatus::LockNotGranted
    }
}

/// Remove the granted stacking lock matching owner, handle and exact range.
///
/// Returns `None` if there is no such lock.
pub(crate) fn release(
    list: &LockList,
    owner: &OwnerContext,
    handle: HandleId,
    range: LockRange,
) -> Option<(LockList, LockRecord)> {
    let index = list.iter().position(|r| {
        !r.lock_type.is_pending()
            && r.flavor == LockFlavor::Stacking
            && r.owner == *owner
            && r.handle == handle
            && r.range == range
    })?;
    let mut next = list.clone();
    let removed = next.remove(index);
    Some((next, removed))
}
