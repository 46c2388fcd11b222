//! Configuration for a [`LockTable`](crate::LockTable).

/// When the validator strips locks held by dead processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValidationPolicy {
    /// Validate the first time this table touches a file.
    #[default]
    FirstTouch,
    /// Validate on every fetch.
    EveryAccess,
    /// Never validate, not even during traversal.
    Disabled,
}

/// Legacy offset at or beyond which stacking conflicts always report
/// [`ConflictStatus::FileLockConflict`](crate::ConflictStatus::FileLockConflict).
pub const DEFAULT_CONFLICT_OFFSET: u64 = 0xEF00_0000;

/// Tunables of a lock table.
///
/// # Example
///
/// ```rust
/// use anyfs_brlock::{LockTableConfig, ValidationPolicy};
///
/// let config = LockTableConfig {
///     validation: ValidationPolicy::EveryAccess,
///     ..LockTableConfig::default()
/// };
/// assert_eq!(config.conflict_offset, 0xEF00_0000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LockTableConfig {
    /// When fetched lock lists are validated.
    pub validation: ValidationPolicy,
    /// Stacking conflicts starting at or beyond this offset (top bit clear)
    /// report `FileLockConflict` instead of `LockNotGranted`.
    pub conflict_offset: u64,
}

impl Default for LockTableConfig {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::FirstTouch,
            conflict_offset: DEFAULT_CONFLICT_OFFSET,
        }
    }
}
