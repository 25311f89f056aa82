//! Peer notification contract.
//!
//! After a cycle commits changes, other clients of the same account are told
//! to sync. Delivery may fail while the channel is down; the coordinator keeps
//! the notification owed and retries after later cycles.

/// Counters the notifier exposes for status aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationStatus {
    /// The notification channel is logged in.
    pub notifications_enabled: bool,
    /// Notifications received from peers.
    pub notifications_received: u64,
    /// Notifications sent to peers.
    pub notifications_sent: u64,
}

/// Sends "new data committed" notifications to peers.
pub trait PeerNotifier: Send + Sync {
    /// Try to notify peers. Returns true once delivered.
    fn send_notification(&self) -> bool;

    /// Leave the notification channel.
    fn logout(&self);

    /// Current counters.
    fn status(&self) -> NotificationStatus;
}
