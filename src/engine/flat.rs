//! Flat-flavor acquire and release, built on the split/merge engine.

use super::blocks;
use crate::conflict::{overlaps, ranges_overlap};
use crate::split_merge::split_merge;
use crate::{ConflictStatus, LockError, LockFlavor, LockList, LockRecord, LockType, OwnerContext};

/// A granted flat lock.
#[derive(Debug)]
pub(crate) struct FlatGrant {
    /// The replacement list.
    pub list: LockList,
    /// `true` if a read lock replaced part of the owner's own write lock.
    pub downgraded: bool,
}

/// Insert `plock`, splitting and merging the requester's existing ranges.
///
/// All-or-nothing: on conflict the input list is left as it was.
pub(crate) fn acquire(list: &LockList, plock: &LockRecord) -> Result<FlatGrant, LockError> {
    if let Some(blocker) = list.iter().find(|ex| blocks(ex, plock)) {
        return Err(LockError::Conflict {
            blocker: *blocker,
            self_blocked: blocker.owner == plock.owner,
            status: ConflictStatus::FileLockConflict,
        });
    }

    if plock.lock_type.is_pending() {
        let mut next = list.clone();
        next.push(*plock);
        return Ok(FlatGrant {
            list: next,
            downgraded: false,
        });
    }

    // Splitting one range in two plus the new lock adds at most two records.
    let mut out = Vec::with_capacity(list.len() + 2);
    let mut consumed = false;
    let mut downgraded = false;

    for ex in list {
        if ex.flavor != LockFlavor::Flat || ex.lock_type.is_pending() {
            out.push(*ex);
            continue;
        }
        if ex.owner == plock.owner
            && ex.lock_type == LockType::Write
            && plock.lock_type == LockType::Read
            && overlaps(ex, plock)
        {
            downgraded = true;
        }
        let step = split_merge(ex, plock);
        consumed |= step.consumed;
        out.extend_from_slice(step.fragments.as_slice());
    }

    if !consumed {
        out.push(*plock);
    }

    let out = fuse_fragments(out, &plock.owner);
    debug_assert!(
        owner_ranges_disjoint(&out, &plock.owner),
        "flat acquire left overlapping ranges for {}",
        plock.owner
    );

    Ok(FlatGrant {
        list: out.into(),
        downgraded,
    })
}

/// Carve `unlock.range` out of the requester's flat locks.
///
/// Returns `None` when no lock changed shape, which is a legal no-op.
pub(crate) fn release(list: &LockList, unlock: &LockRecord) -> Option<LockList> {
    debug_assert_eq!(unlock.lock_type, LockType::Unlock);

    // A split in the middle leaves one extra record.
    let mut out = Vec::with_capacity(list.len() + 1);
    let mut changed = false;

    for ex in list {
        if ex.flavor != LockFlavor::Flat || ex.lock_type.is_pending() || ex.owner != unlock.owner {
            out.push(*ex);
            continue;
        }
        let step = split_merge(ex, unlock);
        let mark = out.len();
        out.extend(
            step.fragments
                .as_slice()
                .iter()
                .filter(|r| r.lock_type != LockType::Unlock),
        );
        if out[mark..] != [*ex][..] {
            changed = true;
        }
    }

    changed.then(|| out.into())
}

fn fusable(record: &LockRecord, owner: &OwnerContext) -> bool {
    record.flavor == LockFlavor::Flat
        && record.owner == *owner
        && matches!(record.lock_type, LockType::Read | LockType::Write)
        && record.range.size > 0
}

/// Fuse the owner's same-type flat fragments that overlap or touch.
///
/// A proposed lock spanning several existing ranges is merged into each of
/// them separately; this folds those copies back into single ranges.
fn fuse_fragments(records: Vec<LockRecord>, owner: &OwnerContext) -> Vec<LockRecord> {
    let mut mine: Vec<LockRecord> = records
        .iter()
        .filter(|r| fusable(r, owner))
        .copied()
        .collect();
    mine.sort_by_key(|r| (r.lock_type == LockType::Write, r.range.start));

    let mut fused: Vec<LockRecord> = Vec::with_capacity(mine.len());
    for r in &mine {
        match fused.last_mut() {
            Some(last) if last.lock_type == r.lock_type && r.range.start <= last.range.end() => {
                let end = last.range.end().max(r.range.end());
                last.range.size = end - last.range.start;
            }
            _ => fused.push(*r),
        }
    }

    if fused.len() == mine.len() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| !fusable(r, owner))
        .chain(fused)
        .collect()
}

fn owner_ranges_disjoint(records: &[LockRecord], owner: &OwnerContext) -> bool {
    let mine: Vec<&LockRecord> = records.iter().filter(|r| fusable(r, owner)).collect();
    mine.iter().enumerate().all(|(i, a)| {
        mine[i + 1..]
            .iter()
            .all(|b| !ranges_overlap(&a.range, &b.range))
    })
}
