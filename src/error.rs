//! Error types for the byte-range lock database.

use std::fmt;

use crate::{FileIdentity, LockRecord, LockType};

/// Status reported to the protocol layer for a refused lock.
///
/// Legacy clients distinguish a first refusal (`LockNotGranted`) from a
/// repeated or high-offset one (`FileLockConflict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConflictStatus {
    /// The lock could not be granted right now.
    LockNotGranted,
    /// The range conflicts with an existing lock.
    FileLockConflict,
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictStatus::LockNotGranted => f.write_str("lock not granted"),
            ConflictStatus::FileLockConflict => f.write_str("file lock conflict"),
        }
    }
}

/// Lock coordinator error type.
///
/// Every variant is returned before the stored lock list is touched, so a
/// failed call never leaves a partial mutation behind.
///
/// # Examples
///
/// ```rust
/// use anyfs_brlock::LockError;
///
/// let err = LockError::InvalidRange { start: 0, size: 0, reason: "zero-zero range" };
/// assert_eq!(err.to_string(), "invalid range [0, +0): zero-zero range");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The requested range is malformed.
    #[error("invalid range [{start}, +{size}): {reason}")]
    InvalidRange {
        /// Requested start offset.
        start: u64,
        /// Requested size.
        size: u64,
        /// Why the range was refused.
        reason: &'static str,
    },

    /// An existing lock blocks the request.
    #[error("{status}: blocked by {blocker}")]
    Conflict {
        /// The first existing record found to block the request.
        blocker: LockRecord,
        /// `true` if the blocker belongs to the requester itself.
        self_blocked: bool,
        /// Status to report to the client.
        status: ConflictStatus,
    },

    /// The lock type makes no sense for this operation.
    #[error("{operation}: unsupported lock type {lock_type:?}")]
    UnsupportedType {
        /// The operation that was refused.
        operation: &'static str,
        /// The offending lock type.
        lock_type: LockType,
    },

    /// The lock store failed.
    #[error("{operation} failed for {identity}: {source}")]
    Storage {
        /// The store operation that failed.
        operation: &'static str,
        /// The file whose lock list was being accessed.
        identity: FileIdentity,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// Listing the stored identities failed.
    #[error("traversal failed: {source}")]
    Traversal {
        /// The underlying store error.
        #[source]
        source: StoreError,
    },
}

impl LockError {
    /// Returns `true` for [`LockError::Conflict`].
    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, LockError::Conflict { .. })
    }
}

/// Error reported by a [`LockStore`](crate::LockStore) implementation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Generic backend error.
    #[error("backend error: {0}")]
    Backend(String),

    /// A latch or map lock was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    Poisoned,

    /// `chain_unlock` was called for a key that is not latched.
    #[error("chain lock not held: {identity}")]
    NotLatched {
        /// The key that was not latched.
        identity: FileIdentity,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
