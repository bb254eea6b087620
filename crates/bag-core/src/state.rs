//! Shared sync state types.

use std::fmt;

/// Lifecycle of the sync engine.
///
/// `Idle → Running → Reconciling → Purging → Committing → Idle`. A session
/// that aborts goes straight back to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    Running,
    Reconciling,
    Purging,
    Committing,
}

impl SyncState {
    /// Returns true while a session owns the engine.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Reconciling => "reconciling",
            Self::Purging => "purging",
            Self::Committing => "committing",
        };
        f.write_str(label)
    }
}
