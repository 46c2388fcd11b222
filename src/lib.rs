//! # anyfs-brlock
//!
//! Byte-range lock coordinator for **AnyFS** file servers.
//!
//! Decides whether a byte-range lock may be granted on a file, records
//! granted locks in a per-file lock database, releases them, answers
//! "would this conflict?" queries, and tells blocked waiters when a range
//! they wait on may have been freed.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use anyfs_brlock::*;
//!
//! let table = LockTable::new(MemoryStore::new());
//! let file = FileIdentity::new(1, 42);
//! let me = OwnerContext::new(1, 100, ProcessId(7));
//!
//! // Flat locks merge with the owner's existing ranges...
//! let w = |start, size| LockRecord::new(me, HandleId(1), LockRange::new(start, size), LockType::Write, LockFlavor::Flat);
//! table.acquire(&file, &w(0, 50), None)?;
//! table.acquire(&file, &w(10, 10), None)?;
//! assert_eq!(table.locks(&file)?.len(), 1);
//!
//! // ...and releases carve holes in them.
//! table.release(&file, &me, HandleId(1), LockRange::new(20, 10), LockFlavor::Flat)?;
//! assert_eq!(table.locks(&file)?.len(), 2);
//! # Ok::<(), LockError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`LockTable`] | The facade: acquire, release, query, close, traverse |
//! | [`LockStore`] | Per-file persistent lock lists with a per-key chain lock |
//! | [`MemoryStore`] | In-memory [`LockStore`] |
//! | [`LockRecord`] | One granted or pending lock |
//! | [`LockList`] | All records of one file |
//! | [`LockError`] | Error type with context |
//!
//! ---
//!
//! ## Lock Flavors
//!
//! **[`LockFlavor::Stacking`]** (Windows-style)
//! - Locks stack: the same owner may hold overlapping ranges.
//! - A release names one exact range.
//! - Reads through the same handle do not block each other.
//!
//! **[`LockFlavor::Flat`]** (POSIX-style)
//! - An owner holds at most one lock per byte.
//! - New locks split and merge the owner's existing ranges.
//! - A release may cover any sub-range, or nothing at all.
//!
//! A [`LockType::Pending`] record is a placeholder for a blocked request. It
//! never conflicts; when an overlapping range is released, its owner is woken
//! through a [`WakeNotifier`].
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, LockError>`. A failed operation never
//! leaves a partial change in the store.
//!
//! ```rust
//! use anyfs_brlock::LockError;
//!
//! let err = LockError::InvalidRange { start: 0, size: 0, reason: "zero-zero range on a flat lock" };
//! assert_eq!(err.to_string(), "invalid range [0, +0): zero-zero range on a flat lock");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! [`LockStore`], [`Liveness`] and [`WakeNotifier`] require `Send + Sync`,
//! and every [`LockTable`] method takes `&self`. Operations on one file are
//! serialized by the store's chain lock; operations on different files run
//! in parallel.
//!
//! ---
//!
//! ## Logging
//!
//! Emits [`tracing`](https://docs.rs/tracing) events: `debug` for grants,
//! refusals, releases and handle closes, `info` when stale locks are
//! stripped, `warn` when a chain lock cannot be released.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for all record types, [`LockTableConfig`], and `LockList::to_json`/`from_json` |

// Private modules
#[cfg(feature = "serde")]
mod codec;
mod config;
mod conflict;
mod engine;
mod error;
mod notify;
mod split_merge;
mod store;
mod table;
mod types;
mod validate;

// Public re-exports - error types
pub use error::{ConflictStatus, LockError, StoreError};

// Public re-exports - core types
pub use types::{
    FileIdentity, HandleId, LockFlavor, LockList, LockRange, LockRecord, LockType, OwnerContext,
    ProcessId,
};

// Public re-exports - facade
pub use table::{Granted, LockTable, Released};

// Public re-exports - configuration
pub use config::{DEFAULT_CONFLICT_OFFSET, LockTableConfig, ValidationPolicy};

// Public re-exports - storage
pub use store::{LockStore, MemoryStore};

// Public re-exports - host hooks
pub use notify::{NoWake, WakeNotifier, pending_overlap, wake_targets};
pub use validate::{AssumeAlive, Liveness, strip_dead};

// Public re-exports - conflict rules and split/merge
pub use conflict::{
    flat_conflicts, overlaps, ranges_overlap, stacking_conflicts, stacking_conflicts_excluding_self,
};
pub use split_merge::{Fragments, SplitMerge, split_merge};
