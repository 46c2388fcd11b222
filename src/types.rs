//! Core types for the byte-range lock database.

use std::fmt;

/// Host process identifier of a lock owner.
///
/// Used by the validator to decide whether a lock's owner is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(pub u32);

/// Opaque identifier of one open handle on a file.
///
/// The internal value is defined by the protocol layer (an fnum, an index, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandleId(pub u64);

/// Identifies who is asking for a lock.
///
/// Two contexts are equal iff the session, the client-supplied sub-identifier
/// and the host process all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnerContext {
    /// Session (connection / tree) identifier.
    pub session: u64,
    /// Client-supplied sub-identifier, sent with each request.
    pub client_pid: u32,
    /// Host process serving the session.
    pub process: ProcessId,
}

impl OwnerContext {
    /// Create a new owner context.
    #[inline]
    pub const fn new(session: u64, client_pid: u32, process: ProcessId) -> Self {
        Self {
            session,
            client_pid,
            process,
        }
    }

    /// Returns `true` if both contexts belong to the same session in the same
    /// host process, whatever the client sub-identifier.
    #[inline]
    pub fn same_session(&self, other: &OwnerContext) -> bool {
        self.session == other.session && self.process == other.process
    }
}

impl fmt::Display for OwnerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.session, self.client_pid, self.process.0)
    }
}

/// A byte range `[start, start + size)`.
///
/// A `size` of zero is a degenerate range. Legacy clients use it as a
/// "to end of address space" probe on the stacking flavor; the flat flavor
/// rejects `0/0` outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockRange {
    /// First byte covered.
    pub start: u64,
    /// Number of bytes covered.
    pub size: u64,
}

impl LockRange {
    /// Create a range from a start offset and a length.
    #[inline]
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// One past the last byte covered.
    ///
    /// Saturates for ranges that would wrap; such ranges are rejected before
    /// they reach the lock list.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// Returns `true` if `start + size` overflows 64 bits.
    #[inline]
    pub const fn wraps(&self) -> bool {
        self.start.checked_add(self.size).is_none()
    }

    /// Returns `true` for the `0/0` range.
    #[inline]
    pub const fn is_zero_zero(&self) -> bool {
        self.start == 0 && self.size == 0
    }
}

impl fmt::Display for LockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, +{})", self.start, self.size)
    }
}

/// Type of a byte-range lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LockType {
    /// Shared lock - multiple readers allowed.
    Read,
    /// Exclusive lock - single writer only.
    Write,
    /// Sentinel used while computing flat unlock ranges. Never stored.
    Unlock,
    /// Placeholder for a blocked request awaiting a wake signal.
    /// Never conflicts with anything.
    Pending,
}

impl LockType {
    /// Returns `true` for [`LockType::Pending`].
    #[inline]
    pub const fn is_pending(self) -> bool {
        matches!(self, LockType::Pending)
    }
}

/// Which locking semantics a record follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LockFlavor {
    /// Overlapping locks from the same owner coexist; no merging.
    Stacking,
    /// Lock space is partitioned into non-overlapping, type-homogeneous ranges.
    Flat,
}

/// One outstanding or pending lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockRecord {
    /// Who holds (or waits for) the lock.
    pub owner: OwnerContext,
    /// Range covered.
    pub range: LockRange,
    /// Handle the lock was taken through. Ignored by flat-flavor checks.
    pub handle: HandleId,
    /// Read, write or pending.
    pub lock_type: LockType,
    /// Stacking or flat semantics.
    pub flavor: LockFlavor,
}

impl LockRecord {
    /// Create a new record.
    #[inline]
    pub const fn new(
        owner: OwnerContext,
        handle: HandleId,
        range: LockRange,
        lock_type: LockType,
        flavor: LockFlavor,
    ) -> Self {
        Self {
            owner,
            range,
            handle,
            lock_type,
            flavor,
        }
    }

    /// Copy of this record covering `range` instead.
    #[inline]
    pub const fn with_range(&self, range: LockRange) -> Self {
        Self { range, ..*self }
    }
}

impl fmt::Display for LockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:?} {} by {} on handle {}",
            self.flavor, self.lock_type, self.range, self.owner, self.handle.0
        )
    }
}

/// Stable key of a file in the lock database (device + inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileIdentity {
    /// Device the file lives on.
    pub device: u64,
    /// Inode number on that device.
    pub inode: u64,
}

impl FileIdentity {
    /// Create a new identity.
    #[inline]
    pub const fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// All locks on one file, in no particular order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LockList(Vec<LockRecord>);

impl LockList {
    /// Create an empty list.
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the records.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, LockRecord> {
        self.0.iter()
    }

    /// Records as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[LockRecord] {
        &self.0
    }

    /// Pending placeholders only.
    pub fn pending(&self) -> impl Iterator<Item = &LockRecord> {
        self.0.iter().filter(|r| r.lock_type.is_pending())
    }

    pub(crate) fn push(&mut self, record: LockRecord) {
        self.0.push(record);
    }

    pub(crate) fn remove(&mut self, index: usize) -> LockRecord {
        self.0.remove(index)
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&LockRecord) -> bool) {
        self.0.retain(keep);
    }
}

impl From<Vec<LockRecord>> for LockList {
    fn from(records: Vec<LockRecord>) -> Self {
        Self(records)
    }
}

impl FromIterator<LockRecord> for LockList {
    fn from_iter<I: IntoIterator<Item = LockRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LockList {
    type Item = &'a LockRecord;
    type IntoIter = std::slice::Iter<'a, LockRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(session: u64) -> OwnerContext {
        OwnerContext::new(session, 1, ProcessId(100))
    }

    #[test]
    fn owner_equality_needs_all_fields() {
        let a = OwnerContext::new(1, 2, ProcessId(3));
        assert_eq!(a, OwnerContext::new(1, 2, ProcessId(3)));
        assert_ne!(a, OwnerContext::new(9, 2, ProcessId(3)));
        assert_ne!(a, OwnerContext::new(1, 9, ProcessId(3)));
        assert_ne!(a, OwnerContext::new(1, 2, ProcessId(9)));
    }

    #[test]
    fn same_session_ignores_client_pid() {
        let a = OwnerContext::new(1, 2, ProcessId(3));
        assert!(a.same_session(&OwnerContext::new(1, 7, ProcessId(3))));
        assert!(!a.same_session(&OwnerContext::new(2, 2, ProcessId(3))));
    }

    #[test]
    fn range_end_and_wrap() {
        assert_eq!(LockRange::new(10, 5).end(), 15);
        assert!(!LockRange::new(u64::MAX, 0).wraps());
        assert!(LockRange::new(u64::MAX, 1).wraps());
        assert_eq!(LockRange::new(u64::MAX, 1).end(), u64::MAX);
    }

    #[test]
    fn zero_zero_range() {
        assert!(LockRange::new(0, 0).is_zero_zero());
        assert!(!LockRange::new(1, 0).is_zero_zero());
        assert!(!LockRange::new(0, 1).is_zero_zero());
    }

    #[test]
    fn record_with_range_keeps_everything_else() {
        let r = LockRecord::new(
            owner(1),
            HandleId(4),
            LockRange::new(0, 10),
            LockType::Write,
            LockFlavor::Flat,
        );
        let moved = r.with_range(LockRange::new(5, 1));
        assert_eq!(moved.range, LockRange::new(5, 1));
        assert_eq!(moved.owner, r.owner);
        assert_eq!(moved.handle, r.handle);
        assert_eq!(moved.lock_type, r.lock_type);
        assert_eq!(moved.flavor, r.flavor);
    }

    #[test]
    fn lock_list_pending_filter() {
        let base = LockRecord::new(
            owner(1),
            HandleId(1),
            LockRange::new(0, 1),
            LockType::Read,
            LockFlavor::Stacking,
        );
        let list: LockList = vec![
            base,
            LockRecord {
                lock_type: LockType::Pending,
                ..base
            },
        ]
        .into();
        assert_eq!(list.len(), 2);
        assert_eq!(list.pending().count(), 1);
    }

    #[test]
    fn display_formats() {
        assert_eq!(FileIdentity::new(8, 42).to_string(), "8:42");
        assert_eq!(LockRange::new(3, 4).to_string(), "[3, +4)");
        assert_eq!(owner(7).to_string(), "7/1@100");
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OwnerContext>();
        assert_send_sync::<LockRange>();
        assert_send_sync::<LockRecord>();
        assert_send_sync::<LockList>();
        assert_send_sync::<FileIdentity>();
    }
}
