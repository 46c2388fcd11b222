//! # Range Split/Merge Engine
//!
//! Computes how a proposed flat-flavor lock (`plock`) reshapes one existing
//! flat-flavor lock (`ex`) of the same owner.
//!
//! ```text
//!  1. plock.size == 0          ex unchanged
//!  2. no overlap (touching     ex unchanged
//!     counts as overlap)
//!  3. ex inside plock          plock
//!  4. ex starts in plock,      differ: plock | ex tail      same: plock..ex.end
//!     ends past it
//!  5. ex starts before plock,  differ: ex head | plock      same: ex.start..plock.end
//!     ends inside it
//!  6. ex strictly contains     differ: ex head | plock | ex tail
//!     plock                    same:   ex (plock absorbed)
//! ```
//!
//! For unlocks, `plock` carries [`LockType::Unlock`](crate::LockType::Unlock):
//! the type always differs, and the caller drops the `Unlock` fragment and
//! keeps the surviving pieces of `ex`.

use crate::{LockRange, LockRecord};

/// One to three records replacing an existing lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragments {
    /// A single record.
    One(LockRecord),
    /// Two records, in address order.
    Two([LockRecord; 2]),
    /// Three records, in address order.
    Three([LockRecord; 3]),
}

impl Fragments {
    /// Number of records (1, 2 or 3).
    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Always `false`; present for symmetry with [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The records as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[LockRecord] {
        match self {
            Fragments::One(r) => std::slice::from_ref(r),
            Fragments::Two(rs) => rs,
            Fragments::Three(rs) => rs,
        }
    }
}

/// Result of splitting/merging one existing record against a proposed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMerge {
    /// Records replacing the existing one.
    pub fragments: Fragments,
    /// `true` if the proposed record is already represented in `fragments`,
    /// so the caller must not append it again.
    pub consumed: bool,
}

impl SplitMerge {
    fn keep(ex: &LockRecord) -> Self {
        Self {
            fragments: Fragments::One(*ex),
            consumed: false,
        }
    }

    fn consumed(fragments: Fragments) -> Self {
        Self {
            fragments,
            consumed: true,
        }
    }
}

/// Split or merge `ex` against `plock`.
///
/// Records of a different owner are never merged and come back unchanged.
///
/// # Panics
///
/// Panics if the geometry matches none of the six cases, which would be a
/// logic error in the case analysis.
pub fn split_merge(ex: &LockRecord, plock: &LockRecord) -> SplitMerge {
    if ex.owner != plock.owner {
        return SplitMerge::keep(ex);
    }

    let (ex_start, ex_end) = (ex.range.start, ex.range.end());
    let (p_start, p_end) = (plock.range.start, plock.range.end());
    let types_differ = ex.lock_type != plock.lock_type;

    if plock.range.size == 0 {
        return SplitMerge::keep(ex);
    }

    if ex_start > p_end || p_start > ex_end {
        return SplitMerge::keep(ex);
    }

    if ex_start >= p_start && ex_end <= p_end {
        return SplitMerge::consumed(Fragments::One(*plock));
    }

    if ex_start >= p_start && ex_start <= p_end && ex_end > p_end {
        if types_differ {
            let tail = ex.with_range(LockRange::new(p_end, ex_end - p_end));
            return SplitMerge::consumed(Fragments::Two([*plock, tail]));
        }
        let merged = plock.with_range(LockRange::new(p_start, ex_end - p_start));
        return SplitMerge::consumed(Fragments::One(merged));
    }

    if ex_start < p_start && ex_end >= p_start && ex_end <= p_end {
        if types_differ {
            let head = ex.with_range(LockRange::new(ex_start, p_start - ex_start));
            return SplitMerge::consumed(Fragments::Two([head, *plock]));
        }
        let merged = ex.with_range(LockRange::new(ex_start, p_end - ex_start));
        return SplitMerge::consumed(Fragments::One(merged));
    }

    if ex_start < p_start && ex_end > p_end {
        if types_differ {
            let head = ex.with_range(LockRange::new(ex_start, p_start - ex_start));
            let tail = ex.with_range(LockRange::new(p_end, ex_end - p_end));
            return SplitMerge::consumed(Fragments::Three([head, *plock, tail]));
        }
        return SplitMerge::consumed(Fragments::One(*ex));
    }

    unreachable!(
        "split_merge: no case for existing {} against proposed {}",
        ex.range, plock.range
    )
}
