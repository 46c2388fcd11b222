//! # Pending-Wait Notifier
//!
//! Decides which pending waiters must be woken after a range is released.
//! Delivery is left to a [`WakeNotifier`] supplied by the host.

use crate::{LockList, LockRange, OwnerContext};

/// Delivers a wake signal to a blocked requester.
///
/// The coordinator calls [`notify`](WakeNotifier::notify) once per woken
/// pending record and neither retries nor waits for confirmation.
///
/// Implemented for closures:
///
/// ```rust
/// use anyfs_brlock::{OwnerContext, WakeNotifier};
///
/// let notifier = |waiter: &OwnerContext| println!("wake {waiter}");
/// fn takes<W: WakeNotifier>(_: &W) {}
/// takes(&notifier);
/// ```
pub trait WakeNotifier: Send + Sync {
    /// Wake the owner of a pending lock.
    fn notify(&self, waiter: &OwnerContext);
}

impl<F> WakeNotifier for F
where
    F: Fn(&OwnerContext) + Send + Sync,
{
    fn notify(&self, waiter: &OwnerContext) {
        self(waiter)
    }
}

/// A notifier that drops every wake signal.
///
/// Callers that deliver wakes themselves read them from the operation result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWake;

impl WakeNotifier for NoWake {
    fn notify(&self, _waiter: &OwnerContext) {}
}

/// Returns `true` if releasing `released` may unblock a waiter on `pending`.
///
/// Either the pending start lies inside the released range, or the released
/// start lies inside the pending range (inclusive of its end).
#[inline]
pub fn pending_overlap(released: &LockRange, pending: &LockRange) -> bool {
    (released.start <= pending.start && released.end() > pending.start)
        || (released.start >= pending.start && released.start <= pending.end())
}

/// Owners of every pending record in `list` overlapping any of `released`.
///
/// Each pending record appears at most once, in list order.
pub fn wake_targets(list: &LockList, released: &[LockRange]) -> Vec<OwnerContext> {
    list.pending()
        .filter(|p| released.iter().any(|r| pending_overlap(r, &p.range)))
        .map(|p| p.owner)
        .collect()
}
