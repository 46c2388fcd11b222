//! # Lock Store
//!
//! The persistent key-value store holding one [`LockList`] per
//! [`FileIdentity`].
//!
//! ## Contract
//!
//! ```text
//! chain_lock(id) ──▶ fetch(id) ──▶ store(id, list) | delete(id) ──▶ chain_unlock(id)
//! ```
//!
//! - `chain_lock` grants exclusive access to one key until `chain_unlock`.
//!   It may block while another caller holds the same key.
//! - `fetch` returns an empty list for an absent key.
//! - `store` replaces the whole list; `delete` removes the key.
//! - The [`LockTable`](crate::LockTable) calls `store` or `delete` at most once
//!   per operation, after every check has passed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use crate::{FileIdentity, LockList, StoreError};

/// Storage backend for per-file lock lists.
///
/// # Thread Safety
///
/// Requires `Send + Sync`. Methods take `&self`; implementations use interior
/// mutability, and the per-key chain lock is the only serialization the
/// coordinator relies on.
pub trait LockStore: Send + Sync {
    /// Acquire the exclusive latch for `identity`, waiting if needed.
    fn chain_lock(&self, identity: &FileIdentity) -> Result<(), StoreError>;

    /// Release the latch taken by [`chain_lock`](Self::chain_lock).
    fn chain_unlock(&self, identity: &FileIdentity) -> Result<(), StoreError>;

    /// Read the lock list for `identity` (empty if absent).
    fn fetch(&self, identity: &FileIdentity) -> Result<LockList, StoreError>;

    /// Replace the lock list for `identity`.
    fn store(&self, identity: &FileIdentity, list: &LockList) -> Result<(), StoreError>;

    /// Remove the entry for `identity`.
    fn delete(&self, identity: &FileIdentity) -> Result<(), StoreError>;

    /// Every identity that currently has an entry.
    fn identities(&self) -> Result<Vec<FileIdentity>, StoreError>;
}

impl<S: LockStore + ?Sized> LockStore for &S {
    fn chain_lock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).chain_lock(identity)
    }
    fn chain_unlock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).chain_unlock(identity)
    }
    fn fetch(&self, identity: &FileIdentity) -> Result<LockList, StoreError> {
        (**self).fetch(identity)
    }
    fn store(&self, identity: &FileIdentity, list: &LockList) -> Result<(), StoreError> {
        (**self).store(identity, list)
    }
    fn delete(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).delete(identity)
    }
    fn identities(&self) -> Result<Vec<FileIdentity>, StoreError> {
        (**self).identities()
    }
}

impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    fn chain_lock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).chain_lock(identity)
    }
    fn chain_unlock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).chain_unlock(identity)
    }
    fn fetch(&self, identity: &FileIdentity) -> Result<LockList, StoreError> {
        (**self).fetch(identity)
    }
    fn store(&self, identity: &FileIdentity, list: &LockList) -> Result<(), StoreError> {
        (**self).store(identity, list)
    }
    fn delete(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        (**self).delete(identity)
    }
    fn identities(&self) -> Result<Vec<FileIdentity>, StoreError> {
        (**self).identities()
    }
}

/// In-memory [`LockStore`].
///
/// Entries live in a `RwLock<HashMap>`; chain locks are a set of latched keys
/// guarded by a mutex, with a condition variable to wake waiters.
///
/// # Example
///
/// ```rust
/// use anyfs_brlock::{FileIdentity, LockStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// let id = FileIdentity::new(1, 2);
/// store.chain_lock(&id).unwrap();
/// assert!(store.fetch(&id).unwrap().is_empty());
/// store.chain_unlock(&id).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<FileIdentity, LockList>>,
    latched: Mutex<HashSet<FileIdentity>>,
    released: Condvar,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files that currently have locks.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns `true` if no file has locks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `identity` has a stored entry.
    pub fn contains(&self, identity: &FileIdentity) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(identity))
            .unwrap_or(false)
    }
}

impl LockStore for MemoryStore {
    fn chain_lock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        let mut latched = self.latched.lock().map_err(|_| StoreError::Poisoned)?;
        while latched.contains(identity) {
            latched = self
                .released
                .wait(latched)
                .map_err(|_| StoreError::Poisoned)?;
        }
        latched.insert(*identity);
        Ok(())
    }

    fn chain_unlock(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        let mut latched = self.latched.lock().map_err(|_| StoreError::Poisoned)?;
        if !latched.remove(identity) {
            return Err(StoreError::NotLatched {
                identity: *identity,
            });
        }
        drop(latched);
        self.released.notify_all();
        Ok(())
    }

    fn fetch(&self, identity: &FileIdentity) -> Result<LockList, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(identity).cloned().unwrap_or_default())
    }

    fn store(&self, identity: &FileIdentity, list: &LockList) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(*identity, list.clone());
        Ok(())
    }

    fn delete(&self, identity: &FileIdentity) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(identity);
        Ok(())
    }

    fn identities(&self) -> Result<Vec<FileIdentity>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<FileIdentity> = entries.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
