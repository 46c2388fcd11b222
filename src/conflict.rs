//! # Conflict Predicates
//!
//! Pure functions answering "does an existing lock block an incoming one?"
//!
//! | Predicate | Used by | Same owner exempt when |
//! |-----------|---------|------------------------|
//! | [`stacking_conflicts`] | stacking acquire, flat acquire vs stacking records | same handle and incoming is `Read` |
//! | [`stacking_conflicts_excluding_self`] | I/O lock test | same handle, any type |
//! | [`flat_conflicts`] | flat acquire vs flat records | always (handle ignored) |
//!
//! All three ignore [`LockType::Pending`] records and never report two read
//! locks as conflicting.

use crate::{LockRange, LockRecord, LockType};

/// Returns `true` if two ranges intersect.
///
/// Two ranges with identical non-zero `start` and `size` always overlap, even
/// when their end saturates at the top of the 64-bit space.
#[inline]
pub fn ranges_overlap(a: &LockRange, b: &LockRange) -> bool {
    if a.size != 0 && a.start == b.start && a.size == b.size {
        return true;
    }
    !(a.start >= b.end() || b.start >= a.end())
}

/// Returns `true` if the ranges of two records intersect.
#[inline]
pub fn overlaps(a: &LockRecord, b: &LockRecord) -> bool {
    ranges_overlap(&a.range, &b.range)
}

#[inline]
fn never_conflict(existing: &LockRecord, incoming: &LockRecord) -> bool {
    existing.lock_type.is_pending()
        || incoming.lock_type.is_pending()
        || (existing.lock_type == LockType::Read && incoming.lock_type == LockType::Read)
}

/// Does `existing` block `incoming` under stacking semantics?
///
/// An owner may freely read-lock over its own locks on the same handle.
pub fn stacking_conflicts(existing: &LockRecord, incoming: &LockRecord) -> bool {
    if never_conflict(existing, incoming) {
        return false;
    }
    if existing.owner == incoming.owner
        && incoming.lock_type == LockType::Read
        && existing.handle == incoming.handle
    {
        return false;
    }
    overlaps(existing, incoming)
}

/// Does `existing` block `incoming`, ignoring everything the requester holds
/// through the same handle?
///
/// Only for advisory "would someone else's lock get in the way" checks, never
/// for acquisition. A write over a read from the same owner and handle does
/// not conflict here, while the same write through a different handle does.
/// That asymmetry is a legacy contract.
pub fn stacking_conflicts_excluding_self(existing: &LockRecord, incoming: &LockRecord) -> bool {
    if never_conflict(existing, incoming) {
        return false;
    }
    if existing.owner == incoming.owner && existing.handle == incoming.handle {
        return false;
    }
    overlaps(existing, incoming)
}

/// Does `existing` block `incoming` under flat semantics?
///
/// Flat locks are per owner: an owner never conflicts with itself, whatever
/// the handle.
pub fn flat_conflicts(existing: &LockRecord, incoming: &LockRecord) -> bool {
    if never_conflict(existing, incoming) {
        return false;
    }
    if existing.owner == incoming.owner {
        return false;
    }
    overlaps(existing, incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandleId, LockFlavor, OwnerContext, ProcessId};

    const A: OwnerContext = OwnerContext::new(1, 1, ProcessId(10));
    const B: OwnerContext = OwnerContext::new(2, 1, ProcessId(20));

    fn rec(owner: OwnerContext, handle: u64, start: u64, size: u64, t: LockType) -> LockRecord {
        LockRecord::new(
            owner,
            HandleId(handle),
            LockRange::new(start, size),
            t,
            LockFlavor::Stacking,
        )
    }

    #[test]
    fn disjoint_and_touching_ranges_do_not_overlap() {
        assert!(!ranges_overlap(&LockRange::new(0, 10), &LockRange::new(10, 10)));
        assert!(!ranges_overlap(&LockRange::new(10, 10), &LockRange::new(0, 10)));
        assert!(ranges_overlap(&LockRange::new(0, 11), &LockRange::new(10, 10)));
    }

    #[test]
    fn identical_ranges_overlap_at_top_of_space() {
        let top = LockRange::new(u64::MAX - 1, 1);
        assert!(ranges_overlap(&top, &top));
        let sat = LockRange::new(u64::MAX, 0);
        assert!(!ranges_overlap(&sat, &sat));
    }

    #[test]
    fn zero_size_range_overlaps_only_when_straddled() {
        let probe = LockRange::new(5, 0);
        assert!(ranges_overlap(&probe, &LockRange::new(0, 10)));
        assert!(!ranges_overlap(&probe, &LockRange::new(5, 10)));
        assert!(!ranges_overlap(&probe, &LockRange::new(0, 5)));
    }

    #[test]
    fn pending_never_conflicts() {
        let w = rec(A, 1, 0, 10, LockType::Write);
        let p = rec(B, 2, 0, 10, LockType::Pending);
        assert!(!stacking_conflicts(&w, &p));
        assert!(!stacking_conflicts(&p, &w));
        assert!(!flat_conflicts(&w, &p));
        assert!(!stacking_conflicts_excluding_self(&p, &w));
    }

    #[test]
    fn reads_never_conflict() {
        let r1 = rec(A, 1, 0, 10, LockType::Read);
        let r2 = rec(B, 2, 0, 10, LockType::Read);
        assert!(!stacking_conflicts(&r1, &r2));
        assert!(!flat_conflicts(&r1, &r2));
    }

    #[test]
    fn stacking_same_handle_read_over_write_is_allowed() {
        let w = rec(A, 1, 0, 10, LockType::Write);
        let r = rec(A, 1, 5, 10, LockType::Read);
        assert!(!stacking_conflicts(&w, &r));
    }

    #[test]
    fn stacking_same_owner_write_over_own_lock_conflicts() {
        let r = rec(A, 1, 0, 10, LockType::Read);
        let w = rec(A, 1, 5, 10, LockType::Write);
        assert!(stacking_conflicts(&r, &w));
    }

    #[test]
    fn stacking_other_handle_read_over_write_conflicts() {
        let w = rec(A, 1, 0, 10, LockType::Write);
        let r = rec(A, 2, 5, 10, LockType::Read);
        assert!(stacking_conflicts(&w, &r));
    }

    #[test]
    fn excluding_self_write_over_read_is_a_legacy_contract() {
        let r = rec(A, 1, 0, 10, LockType::Read);
        let same_handle = rec(A, 1, 0, 10, LockType::Write);
        let other_handle = rec(A, 2, 0, 10, LockType::Write);
        assert!(!stacking_conflicts_excluding_self(&r, &same_handle));
        assert!(stacking_conflicts_excluding_self(&r, &other_handle));
    }

    #[test]
    fn excluding_self_still_sees_other_owners() {
        let w = rec(B, 1, 0, 10, LockType::Write);
        let r = rec(A, 1, 0, 10, LockType::Read);
        assert!(stacking_conflicts_excluding_self(&w, &r));
    }

    #[test]
    fn flat_ignores_handle_for_same_owner() {
        let w = rec(A, 1, 0, 10, LockType::Write);
        let w2 = rec(A, 99, 0, 10, LockType::Write);
        assert!(!flat_conflicts(&w, &w2));
    }

    #[test]
    fn flat_other_owner_overlap_conflicts() {
        let r = rec(A, 1, 0, 100, LockType::Read);
        let w = rec(B, 2, 50, 100, LockType::Write);
        assert!(flat_conflicts(&r, &w));
        assert!(flat_conflicts(&w, &r));
    }
}
