//! Aggregated status: one snapshot combining syncer, connection, notifier and
//! authentication state.

use crate::connectivity::ConnectionStatus;
use crate::notifier::NotificationStatus;
use crate::syncer::SyncerStatus;

/// One-word summary suitable for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusSummary {
    /// No status has been computed.
    #[default]
    Invalid,
    /// Offline with nothing waiting to be committed.
    Offline,
    /// Offline with local changes waiting.
    OfflineUnsynced,
    /// Online and syncing.
    Syncing,
    /// Online and idle.
    Ready,
    /// Online, with entries in conflict.
    Conflict,
    /// Offline before the initial download finished: nothing to show yet.
    OfflineUnusable,
}

/// A detailed status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    /// The one-word summary.
    pub summary: StatusSummary,
    /// Authentication has succeeded.
    pub authenticated: bool,
    /// The server answered.
    pub server_up: bool,
    /// The network path to the server works.
    pub server_reachable: bool,
    /// The server answered with something unusable.
    pub server_broken: bool,
    /// The notification channel is logged in.
    pub notifications_enabled: bool,
    /// Notifications received from peers.
    pub notifications_received: u64,
    /// Notifications sent to peers.
    pub notifications_sent: u64,
    /// Locally dirty entries not yet committed.
    pub unsynced_count: usize,
    /// Entries in conflict with the server.
    pub conflicting_count: usize,
    /// A sync cycle is running.
    pub syncing: bool,
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

/// Combine component snapshots into one status.
pub fn aggregate(
    syncer: &SyncerStatus,
    connection: &ConnectionStatus,
    notifier: &NotificationStatus,
    authenticated: bool,
) -> Status {
    let mut status = Status {
        summary: StatusSummary::Invalid,
        authenticated,
        server_up: connection.server_up,
        server_reachable: connection.server_reachable,
        server_broken: connection.server_broken,
        notifications_enabled: notifier.notifications_enabled,
        notifications_received: notifier.notifications_received,
        notifications_sent: notifier.notifications_sent,
        unsynced_count: syncer.unsynced_count,
        conflicting_count: syncer.conflicting_count,
        syncing: syncer.syncing,
        initial_sync_ended: syncer.initial_sync_ended,
        syncer_stuck: syncer.syncer_stuck,
        updates_available: syncer.updates_available,
        updates_received: syncer.updates_received,
        disk_full: syncer.disk_full,
        max_consecutive_errors: syncer.max_consecutive_errors,
    };
    status.summary = summarize(&status);
    status
}

fn summarize(status: &Status) -> StatusSummary {
    let online = status.server_reachable
        && status.server_up
        && !status.server_broken
        && status.authenticated;

    if online {
        if status.conflicting_count > 0 {
            StatusSummary::Conflict
        } else if status.syncing {
            StatusSummary::Syncing
        } else {
            StatusSummary::Ready
        }
    } else if !status.initial_sync_ended {
        StatusSummary::OfflineUnusable
    } else if status.unsynced_count > 0 {
        StatusSummary::OfflineUnsynced
    } else {
        StatusSummary::Offline
    }
}
