//! Background syncer contract.

use std::time::Duration;
use treesync_core::SyncerSnapshot;

/// Why a sync cycle is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeSource {
    /// A local write left dirty entries behind.
    Local,
    /// A peer said the server has new data.
    Notification,
    /// The previous cycle ran out of budget before finishing.
    Continuation,
}

/// Counters the syncer exposes for status aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncerStatus {
    /// A cycle is running.
    pub syncing: bool,
    /// Locally dirty entries not yet committed.
    pub unsynced_count: usize,
    /// Entries in conflict with the server.
    pub conflicting_count: usize,
    /// The initial download finished.
    pub initial_sync_ended: bool,
    /// The syncer stopped making progress.
    pub syncer_stuck: bool,
    /// Updates the server has that we have not downloaded.
    pub updates_available: u64,
    /// Updates downloaded so far.
    pub updates_received: u64,
    /// The last commit failed for lack of disk space.
    pub disk_full: bool,
    /// Longest streak of failed cycles.
    pub max_consecutive_errors: u32,
}

/// Progress reports from the syncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncerEvent {
    /// A cycle finished.
    SyncCycleEnded {
        /// More work is known to be waiting.
        has_more_to_sync: bool,
        /// Items committed during the cycle.
        successful_commits: u32,
        /// The share holds enough data to be presented.
        is_share_usable: bool,
    },
    /// Mid-cycle progress.
    StatusChanged {
        /// The share holds enough data to be presented.
        is_share_usable: bool,
    },
}

impl SyncerEvent {
    /// Flatten into the form the session state machine consumes.
    pub fn snapshot(&self) -> SyncerSnapshot {
        match *self {
            SyncerEvent::SyncCycleEnded {
                has_more_to_sync,
                successful_commits,
                is_share_usable,
            } => SyncerSnapshot {
                is_share_usable,
                cycle_ended: true,
                has_more_to_sync,
                successful_commits,
            },
            SyncerEvent::StatusChanged { is_share_usable } => SyncerSnapshot {
                is_share_usable,
                ..SyncerSnapshot::default()
            },
        }
    }
}

/// The background worker that talks to the sync server.
pub trait Syncer: Send + Sync {
    /// Request a cycle after `delay`. Repeated nudges may coalesce.
    fn nudge(&self, delay: Duration, source: NudgeSource);

    /// Stop the worker, waiting up to `timeout`. Returns false on timeout.
    fn stop(&self, timeout: Duration) -> bool;

    /// Current counters.
    fn status(&self) -> SyncerStatus;
}
