//! Online/offline status tracking.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::sync::SyncQueue;

/// Publishes the current connectivity state on a watch channel.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|state| {
            if *state != online {
                *state = online;
                true
            } else {
                false
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Replay the offline report queue every time connectivity comes back.
pub fn spawn_reconnect_sync(
    monitor: &ConnectivityMonitor,
    queue: Arc<SyncQueue>,
    endpoint: String,
) -> tokio::task::JoinHandle<()> {
    let mut rx = monitor.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online {
                let outcome = queue.replay(&endpoint).await;
                info!(
                    delivered = outcome.delivered,
                    remaining = outcome.remaining,
                    "offline report sync finished"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_published_to_subscribers() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();
        assert!(monitor.is_online());

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());

        // Setting the same state again is not a transition.
        monitor.set_online(false);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }
}
