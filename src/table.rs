//! # Lock Table Facade
//!
//! The public entry point. Every operation is one transaction against one
//! [`FileIdentity`]:
//!
//! ```text
//! chain_lock ──▶ fetch ──▶ validate ──▶ engine ──▶ store | delete ──▶ chain_unlock ──▶ wake
//! ```
//!
//! The engines build a fresh list; the table persists it once, only after
//! every check has passed. An empty list deletes the store entry.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::engine::{self, flat, stacking};
use crate::notify::wake_targets;
use crate::validate::strip_dead;
use crate::{
    AssumeAlive, FileIdentity, HandleId, Liveness, LockError, LockFlavor, LockList, LockRange,
    LockRecord, LockStore, LockTableConfig, LockType, NoWake, OwnerContext, StoreError,
    ValidationPolicy, WakeNotifier,
};

/// A granted lock.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Granted {
    /// Pending waiters woken by the grant (a flat write-to-read downgrade).
    pub woken: Vec<OwnerContext>,
}

/// Outcome of a release.
///
/// Releasing something that is not held is not an error: `changed` is
/// `false` and the stored list is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Released {
    /// `true` if the lock list changed.
    pub changed: bool,
    /// Pending waiters woken by the release.
    pub woken: Vec<OwnerContext>,
}

enum Change<T> {
    Keep(T),
    Replace(LockList, T),
}

/// Holds a store chain lock and releases it on drop.
struct ChainLatch<'a, S: LockStore + ?Sized> {
    store: &'a S,
    identity: FileIdentity,
}

impl<'a, S: LockStore + ?Sized> ChainLatch<'a, S> {
    fn acquire(store: &'a S, identity: &FileIdentity) -> Result<Self, LockError> {
        store
            .chain_lock(identity)
            .map_err(storage("chain_lock", identity))?;
        Ok(Self {
            store,
            identity: *identity,
        })
    }
}

impl<S: LockStore + ?Sized> Drop for ChainLatch<'_, S> {
    fn drop(&mut self) {
        if let Err(error) = self.store.chain_unlock(&self.identity) {
            tracing::warn!(identity = %self.identity, %error, "chain unlock failed");
        }
    }
}

fn storage(
    operation: &'static str,
    identity: &FileIdentity,
) -> impl FnOnce(StoreError) -> LockError {
    let identity = *identity;
    move |source| LockError::Storage {
        operation,
        identity,
        source,
    }
}

fn require_read_or_write(operation: &'static str, request: &LockRecord) -> Result<(), LockError> {
    match request.lock_type {
        LockType::Read | LockType::Write => Ok(()),
        lock_type => Err(LockError::UnsupportedType {
            operation,
            lock_type,
        }),
    }
}

/// Byte-range lock coordinator over a [`LockStore`].
///
/// One table stands for one server session: first-touch validation is
/// tracked per table.
///
/// # Example
///
/// ```rust
/// use anyfs_brlock::*;
///
/// let table = LockTable::new(MemoryStore::new());
/// let file = FileIdentity::new(1, 42);
/// let a = OwnerContext::new(1, 100, ProcessId(7));
/// let b = OwnerContext::new(2, 200, ProcessId(8));
///
/// let read = LockRecord::new(a, HandleId(1), LockRange::new(0, 100), LockType::Read, LockFlavor::Flat);
/// table.acquire(&file, &read, None)?;
///
/// let write = LockRecord::new(b, HandleId(2), LockRange::new(50, 100), LockType::Write, LockFlavor::Flat);
/// let err = table.acquire(&file, &write, None).unwrap_err();
/// assert!(matches!(err, LockError::Conflict { self_blocked: false, .. }));
///
/// let released = table.release(&file, &a, HandleId(1), LockRange::new(0, 100), LockFlavor::Flat)?;
/// assert!(released.changed);
/// assert!(table.locks(&file)?.is_empty());
/// # Ok::<(), LockError>(())
/// ```
pub struct LockTable<S, L = AssumeAlive, W = NoWake> {
    store: S,
    liveness: L,
    notifier: W,
    config: LockTableConfig,
    validated: Mutex<HashSet<FileIdentity>>,
}

impl<S: LockStore> LockTable<S> {
    /// Create a table with default configuration, treating every process as
    /// alive and leaving wake delivery to the caller.
    pub fn new(store: S) -> Self {
        Self {
            store,
            liveness: AssumeAlive,
            notifier: NoWake,
            config: LockTableConfig::default(),
            validated: Mutex::new(HashSet::new()),
        }
    }
}

impl<S, L, W> LockTable<S, L, W>
where
    S: LockStore,
    L: Liveness,
    W: WakeNotifier,
{
    /// Use `liveness` to decide which lock owners are still alive.
    pub fn with_liveness<L2: Liveness>(self, liveness: L2) -> LockTable<S, L2, W> {
        LockTable {
            store: self.store,
            liveness,
            notifier: self.notifier,
            config: self.config,
            validated: self.validated,
        }
    }

    /// Deliver wake signals through `notifier`.
    pub fn with_notifier<W2: WakeNotifier>(self, notifier: W2) -> LockTable<S, L, W2> {
        LockTable {
            store: self.store,
            liveness: self.liveness,
            notifier,
            config: self.config,
            validated: self.validated,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LockTableConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &LockTableConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Acquire a lock.
    ///
    /// `previous_failure` is the last refused stacking request on the same
    /// connection, kept by the caller; a retry of it reports
    /// [`ConflictStatus::FileLockConflict`](crate::ConflictStatus::FileLockConflict).
    /// A [`LockType::Pending`] request never conflicts and just records a
    /// placeholder for a blocked waiter.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidRange`] for a wrapping range, or `0/0` on a flat lock
    /// - [`LockError::UnsupportedType`] for [`LockType::Unlock`]
    /// - [`LockError::Conflict`] if an existing lock blocks the request
    /// - [`LockError::Storage`] if the store fails
    pub fn acquire(
        &self,
        identity: &FileIdentity,
        request: &LockRecord,
        previous_failure: Option<&LockRecord>,
    ) -> Result<Granted, LockError> {
        engine::check_range(&request.range, request.flavor)?;
        if request.lock_type == LockType::Unlock {
            return Err(LockError::UnsupportedType {
                operation: "acquire",
                lock_type: request.lock_type,
            });
        }

        let result = self.transact(identity, "acquire", |list| match request.flavor {
            LockFlavor::Stacking => {
                let next = stacking::acquire(
                    list,
                    request,
                    previous_failure,
                    self.config.conflict_offset,
                )?;
                Ok(Change::Replace(next, Granted::default()))
            }
            LockFlavor::Flat => {
                let grant = flat::acquire(list, request)?;
                let woken = if grant.downgraded {
                    wake_targets(&grant.list, &[request.range])
                } else {
                    Vec::new()
                };
                Ok(Change::Replace(grant.list, Granted { woken }))
            }
        });

        match &result {
            Ok(granted) => {
                tracing::debug!(
                    %identity,
                    owner = %request.owner,
                    range = %request.range,
                    lock_type = ?request.lock_type,
                    flavor = ?request.flavor,
                    woken = granted.woken.len(),
                    "lock granted"
                );
                self.deliver(&granted.woken);
            }
            Err(LockError::Conflict {
                blocker,
                self_blocked,
                status,
            }) => {
                tracing::debug!(
                    %identity,
                    owner = %request.owner,
                    range = %request.range,
                    %blocker,
                    self_blocked,
                    %status,
                    "lock refused"
                );
            }
            Err(_) => {}
        }
        result
    }

    /// Release a lock.
    ///
    /// Stacking locks are released by exact owner, handle and range. Flat
    /// releases carve `range` out of whatever the owner holds, on any handle.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidRange`] for a wrapping range, or `0/0` on a flat lock
    /// - [`LockError::Storage`] if the store fails
    pub fn release(
        &self,
        identity: &FileIdentity,
        owner: &OwnerContext,
        handle: HandleId,
        range: LockRange,
        flavor: LockFlavor,
    ) -> Result<Released, LockError> {
        engine::check_range(&range, flavor)?;

        let released = self.transact(identity, "release", |list| {
            let next = match flavor {
                LockFlavor::Stacking => {
                    stacking::release(list, owner, handle, range).map(|(next, _)| next)
                }
                LockFlavor::Flat => {
                    let unlock =
                        LockRecord::new(*owner, handle, range, LockType::Unlock, LockFlavor::Flat);
                    flat::release(list, &unlock)
                }
            };
            Ok(match next {
                Some(next) => {
                    let woken = wake_targets(&next, &[range]);
                    Change::Replace(
                        next,
                        Released {
                            changed: true,
                            woken,
                        },
                    )
                }
                None => Change::Keep(Released::default()),
            })
        })?;

        tracing::debug!(
            %identity,
            %owner,
            %range,
            ?flavor,
            changed = released.changed,
            woken = released.woken.len(),
            "lock released"
        );
        self.deliver(&released.woken);
        Ok(released)
    }

    /// Would `request` be granted right now?
    ///
    /// Returns the first existing lock that blocks it, or `None`. Never
    /// changes the lock list (beyond validation).
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidRange`] for a wrapping range, or `0/0` on a flat lock
    /// - [`LockError::UnsupportedType`] unless the request is a read or write
    /// - [`LockError::Storage`] if the store fails
    pub fn query(
        &self,
        identity: &FileIdentity,
        request: &LockRecord,
    ) -> Result<Option<LockRecord>, LockError> {
        engine::check_range(&request.range, request.flavor)?;
        require_read_or_write("query", request)?;
        self.transact(identity, "query", |list| {
            Ok(Change::Keep(engine::first_blocker(list, request)))
        })
    }

    /// May the requester read (`Read`) or write (`Write`) `request.range`?
    ///
    /// Locks held by the requester through the same handle never get in the
    /// way, and flat locks never block flat I/O.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidRange`] for a wrapping range
    /// - [`LockError::UnsupportedType`] unless the request is a read or write
    /// - [`LockError::Storage`] if the store fails
    pub fn permits_io(
        &self,
        identity: &FileIdentity,
        request: &LockRecord,
    ) -> Result<bool, LockError> {
        engine::check_range(&request.range, LockFlavor::Stacking)?;
        require_read_or_write("permits_io", request)?;
        self.transact(identity, "permits_io", |list| {
            Ok(Change::Keep(engine::permits_io(list, request)))
        })
    }

    /// Remove the pending placeholder of a blocked request the caller gave up on.
    ///
    /// Returns `false` if there is no such placeholder.
    ///
    /// # Errors
    ///
    /// - [`LockError::Storage`] if the store fails
    pub fn cancel_pending(
        &self,
        identity: &FileIdentity,
        owner: &OwnerContext,
        handle: HandleId,
        range: LockRange,
        flavor: LockFlavor,
    ) -> Result<bool, LockError> {
        let cancelled = self.transact(identity, "cancel_pending", |list| {
            Ok(
                match engine::cancel_pending(list, owner, handle, range, flavor) {
                    Some(next) => Change::Replace(next, true),
                    None => Change::Keep(false),
                },
            )
        })?;
        tracing::debug!(%identity, %owner, %range, cancelled, "pending lock cancelled");
        Ok(cancelled)
    }

    /// Drop every lock tied to a closing handle.
    ///
    /// Removes the handle's stacking locks and every flat lock of the same
    /// session and process, then wakes pending waiters overlapping any
    /// removed lock. Returns the woken owners. The file is validated again on
    /// its next touch.
    ///
    /// # Errors
    ///
    /// - [`LockError::Storage`] if the store fails
    pub fn remove_all_for_handle(
        &self,
        identity: &FileIdentity,
        owner: &OwnerContext,
        handle: HandleId,
    ) -> Result<Vec<OwnerContext>, LockError> {
        let woken = self.transact(identity, "remove_all_for_handle", |list| {
            let (kept, removed) = engine::remove_for_handle(list, owner, handle);
            if removed.is_empty() {
                return Ok(Change::Keep(Vec::new()));
            }
            let released: Vec<LockRange> = removed
                .iter()
                .filter(|r| !r.lock_type.is_pending())
                .map(|r| r.range)
                .collect();
            let woken = wake_targets(&kept, &released);
            Ok(Change::Replace(kept, woken))
        })?;
        // The next open of this file validates again.
        self.forget_validated(identity);
        tracing::debug!(%identity, %owner, handle = handle.0, woken = woken.len(), "handle closed");
        self.deliver(&woken);
        Ok(woken)
    }

    /// Current (validated) lock list of a file.
    ///
    /// # Errors
    ///
    /// - [`LockError::Storage`] if the store fails
    pub fn locks(&self, identity: &FileIdentity) -> Result<LockList, LockError> {
        self.transact(identity, "locks", |list| Ok(Change::Keep(list.clone())))
    }

    /// Visit every lock of every file.
    ///
    /// Each file's list is validated (unless validation is disabled) and
    /// persisted if it shrank. `f` runs after the file's chain lock is
    /// released, so it may call back into the table.
    ///
    /// # Errors
    ///
    /// - [`LockError::Traversal`] if the store cannot list its entries
    /// - [`LockError::Storage`] if fetching or persisting an entry fails
    pub fn for_each_lock<F>(&self, mut f: F) -> Result<(), LockError>
    where
        F: FnMut(&FileIdentity, &LockRecord),
    {
        self.sweep(|identity, list| list.iter().for_each(|r| f(identity, r)))
            .map(|_| ())
    }

    /// Validate every file and return how many stale locks were stripped.
    ///
    /// # Errors
    ///
    /// - [`LockError::Traversal`] if the store cannot list its entries
    /// - [`LockError::Storage`] if fetching or persisting an entry fails
    pub fn collect_garbage(&self) -> Result<usize, LockError> {
        let removed = self.sweep(|_, _| {})?;
        if removed > 0 {
            tracing::info!(removed, "garbage collection stripped stale locks");
        }
        Ok(removed)
    }

    fn sweep<F>(&self, mut visit: F) -> Result<usize, LockError>
    where
        F: FnMut(&FileIdentity, &LockList),
    {
        let identities = self
            .store
            .identities()
            .map_err(|source| LockError::Traversal { source })?;
        let force = self.config.validation != ValidationPolicy::Disabled;

        let mut removed = 0;
        for identity in identities {
            let (list, stripped) = {
                let _latch = ChainLatch::acquire(&self.store, &identity)?;
                self.load(&identity, force)?
            };
            removed += stripped;
            visit(&identity, &list);
        }
        Ok(removed)
    }

    fn transact<T, F>(
        &self,
        identity: &FileIdentity,
        operation: &'static str,
        f: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce(&LockList) -> Result<Change<T>, LockError>,
    {
        let _span = tracing::trace_span!("brlock", operation, %identity).entered();
        let _latch = ChainLatch::acquire(&self.store, identity)?;
        let (list, _) = self.load(identity, false)?;
        match f(&list)? {
            Change::Keep(value) => Ok(value),
            Change::Replace(next, value) => {
                self.persist(identity, &next)?;
                Ok(value)
            }
        }
    }

    /// Fetch a list, validating it when policy (or `force`) says so.
    ///
    /// A list that shrank is persisted before anyone sees it.
    fn load(&self, identity: &FileIdentity, force: bool) -> Result<(LockList, usize), LockError> {
        let mut list = self
            .store
            .fetch(identity)
            .map_err(storage("fetch", identity))?;

        if !(force || self.needs_validation(identity)) {
            return Ok((list, 0));
        }

        let removed = strip_dead(&mut list, &self.liveness);
        if removed > 0 {
            tracing::info!(%identity, removed, "stripped locks of dead processes");
            self.persist(identity, &list)?;
        }
        // An empty list has no entry; whoever creates the next one may die too.
        if !list.is_empty() {
            self.mark_validated(identity);
        }
        Ok((list, removed))
    }

    fn needs_validation(&self, identity: &FileIdentity) -> bool {
        match self.config.validation {
            ValidationPolicy::Disabled => false,
            ValidationPolicy::EveryAccess => true,
            ValidationPolicy::FirstTouch => self
                .validated
                .lock()
                .map(|seen| !seen.contains(identity))
                .unwrap_or(true),
        }
    }

    fn mark_validated(&self, identity: &FileIdentity) {
        if self.config.validation == ValidationPolicy::FirstTouch {
            if let Ok(mut seen) = self.validated.lock() {
                seen.insert(*identity);
            }
        }
    }

    fn forget_validated(&self, identity: &FileIdentity) {
        if let Ok(mut seen) = self.validated.lock() {
            seen.remove(identity);
        }
    }

    fn persist(&self, identity: &FileIdentity, list: &LockList) -> Result<(), LockError> {
        if list.is_empty() {
            self.store
                .delete(identity)
                .map_err(storage("delete", identity))?;
            self.forget_validated(identity);
            Ok(())
        } else {
            self.store
                .store(identity, list)
                .map_err(storage("store", identity))
        }
    }

    fn deliver(&self, woken: &[OwnerContext]) {
        for waiter in woken {
            self.notifier.notify(waiter);
        }
    }
}
