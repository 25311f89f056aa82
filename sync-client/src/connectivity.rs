//! Connectivity change signals.
//!
//! Each platform has its own way of learning that network addresses changed.
//! All of them are modelled as a [`ConnectivityWatcher`]: something that can
//! be awaited for the next change. The address watch task forwards every
//! change to the [`ConnectionManager`], which re-probes the server.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Server reachability as last probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// The network path to the server works.
    pub server_reachable: bool,
    /// The server answered.
    pub server_up: bool,
    /// The server answered with something unusable.
    pub server_broken: bool,
}

/// Owns the connection to the sync server.
pub trait ConnectionManager: Send + Sync {
    /// Re-probe the server after a connectivity change.
    fn check_server_reachable(&self);

    /// Last probe result.
    fn status(&self) -> ConnectionStatus;
}

/// A source of "connectivity changed" signals.
#[async_trait]
pub trait ConnectivityWatcher: Send {
    /// Wait for the next change. `None` once the source has gone away.
    async fn changed(&mut self) -> Option<()>;
}

/// Watcher driven by a platform callback that writes into a watch channel.
#[derive(Debug)]
pub struct ChannelWatcher {
    rx: watch::Receiver<u64>,
}

impl ChannelWatcher {
    /// Create a watcher and the sender the platform callback should bump on
    /// every change.
    pub fn channel() -> (watch::Sender<u64>, Self) {
        let (tx, rx) = watch::channel(0);
        (tx, Self { rx })
    }
}

#[async_trait]
impl ConnectivityWatcher for ChannelWatcher {
    async fn changed(&mut self) -> Option<()> {
        self.rx.changed().await.ok()
    }
}

/// Watcher for platforms without change callbacks: samples a fingerprint of
/// the network configuration on an interval and reports when it differs.
pub struct PollingWatcher<F> {
    timer: Interval,
    probe: F,
    last: Option<u64>,
}

impl<F> PollingWatcher<F>
where
    F: FnMut() -> Option<u64> + Send,
{
    /// Sample `probe` every `period`. A probe returning `None` ends the watch.
    pub fn new(period: Duration, probe: F) -> Self {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            timer,
            probe,
            last: None,
        }
    }
}

#[async_trait]
impl<F> ConnectivityWatcher for PollingWatcher<F>
where
    F: FnMut() -> Option<u64> + Send,
{
    async fn changed(&mut self) -> Option<()> {
        loop {
            self.timer.tick().await;
            let current = (self.probe)()?;
            match self.last.replace(current) {
                Some(previous) if previous != current => return Some(()),
                _ => continue,
            }
        }
    }
}

/// Spawn the task forwarding connectivity changes to `manager`.
///
/// The task ends when the watcher does; abort the handle to stop it sooner.
pub fn spawn_address_watch<W>(
    mut watcher: W,
    manager: Arc<dyn ConnectionManager>,
) -> tokio::task::JoinHandle<()>
where
    W: ConnectivityWatcher + 'static,
{
    tokio::spawn(async move {
        tracing::debug!("Address watch started");
        while watcher.changed().await.is_some() {
            tracing::debug!("Connectivity changed; re-checking server");
            manager.check_server_reachable();
        }
        tracing::debug!("Address watch ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingManager {
        checks: AtomicUsize,
    }

    impl ConnectionManager for CountingManager {
        fn check_server_reachable(&self) {
            self.checks.fetch_add(1, Ordering::SeqCst);
        }

        fn status(&self) -> ConnectionStatus {
            ConnectionStatus::default()
        }
    }

    #[tokio::test]
    async fn channel_watcher_forwards_changes() {
        let (tx, watcher) = ChannelWatcher::channel();
        let manager = Arc::new(CountingManager::default());
        let task = spawn_address_watch(watcher, manager.clone());

        tx.send(1).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(2).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(tx);
        task.await.unwrap();
        assert_eq!(manager.checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn polling_watcher_reports_only_differences() {
        let samples = vec![Some(1), Some(1), Some(2), Some(2), Some(3), None];
        let mut iter = samples.into_iter();
        let mut watcher =
            PollingWatcher::new(Duration::from_millis(1), move || iter.next().flatten());

        assert_eq!(watcher.changed().await, Some(()));
        assert_eq!(watcher.changed().await, Some(()));
        assert_eq!(watcher.changed().await, None);
    }

    #[tokio::test]
    async fn polling_watch_task_ends_with_its_source() {
        let mut samples = vec![Some(7), Some(8), None].into_iter();
        let watcher = PollingWatcher::new(Duration::from_millis(1), move || samples.next().flatten());
        let manager = Arc::new(CountingManager::default());

        spawn_address_watch(watcher, manager.clone()).await.unwrap();
        assert_eq!(manager.checks.load(Ordering::SeqCst), 1);
    }
}
