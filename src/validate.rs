//! # Validator
//!
//! Strips locks whose owning process no longer exists, so locks orphaned by
//! a crashed server process cannot block other clients forever.

use crate::{LockList, ProcessId};

/// Answers whether a host process is still alive.
///
/// Implemented for closures:
///
/// ```rust
/// use anyfs_brlock::{Liveness, ProcessId};
///
/// let alive = |pid: ProcessId| pid.0 != 0;
/// assert!(alive.process_exists(ProcessId(42)));
/// assert!(!alive.process_exists(ProcessId(0)));
/// ```
pub trait Liveness: Send + Sync {
    /// Returns `true` if `process` is still running.
    fn process_exists(&self, process: ProcessId) -> bool;
}

impl<F> Liveness for F
where
    F: Fn(ProcessId) -> bool + Send + Sync,
{
    fn process_exists(&self, process: ProcessId) -> bool {
        self(process)
    }
}

/// Liveness predicate that treats every process as alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAlive;

impl Liveness for AssumeAlive {
    fn process_exists(&self, _process: ProcessId) -> bool {
        true
    }
}

/// Remove every record whose owner process is dead.
///
/// Returns the number of records removed.
pub fn strip_dead<L>(list: &mut LockList, liveness: &L) -> usize
where
    L: Liveness + ?Sized,
{
    let before = list.len();
    list.retain(|r| liveness.process_exists(r.owner.process));
    before - list.len()
}
