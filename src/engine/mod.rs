//! # Lock Engines
//!
//! Pure list-to-list transformations behind the [`LockTable`](crate::LockTable)
//! facade. Every function takes the current list by reference and builds a
//! fresh one, so a refused request leaves the stored list untouched.
//!
//! | Flavor | Acquire | Release |
//! |--------|---------|---------|
//! | [`LockFlavor::Stacking`] | append, no merging | remove one exact match |
//! | [`LockFlavor::Flat`] | split/merge against own ranges | carve the range out of own ranges |

pub(crate) mod flat;
pub(crate) mod stacking;

use crate::conflict::{flat_conflicts, stacking_conflicts, stacking_conflicts_excluding_self};
use crate::{HandleId, LockError, LockFlavor, LockList, LockRange, LockRecord, OwnerContext};

/// Reject malformed ranges before any list is touched.
pub(crate) fn check_range(range: &LockRange, flavor: LockFlavor) -> Result<(), LockError> {
    if range.wraps() {
        return Err(LockError::InvalidRange {
            start: range.start,
            size: range.size,
            reason: "range wraps past the end of the 64-bit space",
        });
    }
    if flavor == LockFlavor::Flat && range.is_zero_zero() {
        return Err(LockError::InvalidRange {
            start: range.start,
            size: range.size,
            reason: "zero-zero range on a flat lock",
        });
    }
    Ok(())
}

/// Does `existing` block `incoming` for acquisition?
///
/// Stacking requests check every record with stacking rules. Flat requests
/// check stacking records with stacking rules and flat records with flat rules.
pub(crate) fn blocks(existing: &LockRecord, incoming: &LockRecord) -> bool {
    match (incoming.flavor, existing.flavor) {
        (LockFlavor::Flat, LockFlavor::Flat) => flat_conflicts(existing, incoming),
        _ => stacking_conflicts(existing, incoming),
    }
}

/// First record that would refuse `request`.
pub(crate) fn first_blocker(list: &LockList, request: &LockRecord) -> Option<LockRecord> {
    list.iter().find(|ex| blocks(ex, request)).copied()
}

/// May the requester read or write `request.range` through `request.handle`?
///
/// Flat locks never block I/O of another flat owner; they are enforced by the
/// host's own POSIX locking.
pub(crate) fn permits_io(list: &LockList, request: &LockRecord) -> bool {
    !list.iter().any(|ex| {
        let both_flat = ex.flavor == LockFlavor::Flat && request.flavor == LockFlavor::Flat;
        !both_flat && stacking_conflicts_excluding_self(ex, request)
    })
}

/// Remove the pending record with exactly this owner, handle, flavor and range.
pub(crate) fn cancel_pending(
    list: &LockList,
    owner: &OwnerContext,
    handle: HandleId,
    range: LockRange,
    flavor: LockFlavor,
) -> Option<LockList> {
    let index = list.iter().position(|r| {
        r.lock_type.is_pending()
            && r.owner == *owner
            && r.handle == handle
            && r.flavor == flavor
            && r.range == range
    })?;
    let mut next = list.clone();
    next.remove(index);
    Some(next)
}

/// Split `list` into the records surviving a handle close and those removed.
///
/// Stacking records go with their handle. Flat records belong to the whole
/// session, so every one of them goes.
pub(crate) fn remove_for_handle(
    list: &LockList,
    owner: &OwnerContext,
    handle: HandleId,
) -> (LockList, Vec<LockRecord>) {
    let (removed, kept): (Vec<LockRecord>, Vec<LockRecord>) = list.iter().partition(|r| {
        r.owner.same_session(owner)
            && match r.flavor {
                LockFlavor::Stacking => r.handle == handle,
                LockFlavor::Flat => true,
            }
    });
    (kept.into(), removed)
}
