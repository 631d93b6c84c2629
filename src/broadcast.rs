use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::progress::BatchProgress;

const OBSERVER_BUFFER: usize = 16;

/// Fans out progress snapshots to every connected observer. Observers come
/// and go concurrently with broadcasts; each `publish` works from a
/// copy-on-read snapshot of the registry, so membership changes mid-publish
/// never trip the iteration.
#[derive(Debug, Default)]
pub struct Broadcaster {
    observers: DashMap<String, mpsc::Sender<BatchProgress>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer and returns its id plus the snapshot channel to
    /// drain. The caller owns the receiver; dropping it is equivalent to a
    /// failed delivery and gets the observer unregistered on the next
    /// publish.
    pub fn register(&self) -> (String, mpsc::Receiver<BatchProgress>) {
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
        let id = nanoid::nanoid!(12);
        self.observers.insert(id.clone(), tx);
        debug!(observer = %id, "observer registered");
        (id, rx)
    }

    pub fn unregister(&self, id: &str) {
        if self.observers.remove(id).is_some() {
            debug!(observer = %id, "observer unregistered");
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Delivers `snapshot` to every observer registered at the start of the
    /// call. A slow observer with a full buffer misses this snapshot but
    /// stays registered; one whose channel has closed is dropped from the
    /// registry.
    pub fn publish(&self, snapshot: BatchProgress) {
        let targets: Vec<(String, mpsc::Sender<BatchProgress>)> = self
            .observers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (id, tx) in targets {
            match tx.try_send(snapshot) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(observer = %id, "observer lagging, snapshot skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.observers.remove(&id);
                    debug!(observer = %id, "observer gone, removed from registry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(total: u64, completed: u64) -> BatchProgress {
        BatchProgress { total, completed }
    }

    #[tokio::test]
    async fn registered_observer_receives_published_snapshots() {
        let broadcaster = Broadcaster::new();
        let (_id, mut rx) = broadcaster.register();

        broadcaster.publish(snap(5, 0));
        broadcaster.publish(snap(5, 5));

        assert_eq!(rx.recv().await, Some(snap(5, 0)));
        assert_eq!(rx.recv().await, Some(snap(5, 5)));
    }

    #[tokio::test]
    async fn every_observer_gets_the_same_snapshot() {
        let broadcaster = Broadcaster::new();
        let (_a, mut rx_a) = broadcaster.register();
        let (_b, mut rx_b) = broadcaster.register();

        broadcaster.publish(snap(3, 1));

        assert_eq!(rx_a.recv().await, Some(snap(3, 1)));
        assert_eq!(rx_b.recv().await, Some(snap(3, 1)));
    }

    #[tokio::test]
    async fn unregistered_observer_receives_nothing_further() {
        let broadcaster = Broadcaster::new();
        let (id, mut rx) = broadcaster.register();

        broadcaster.publish(snap(2, 1));
        broadcaster.unregister(&id);
        broadcaster.publish(snap(2, 2));

        assert_eq!(rx.recv().await, Some(snap(2, 1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_observer_is_dropped_on_publish() {
        let broadcaster = Broadcaster::new();
        let (_id, rx) = broadcaster.register();
        drop(rx);

        assert_eq!(broadcaster.observer_count(), 1);
        broadcaster.publish(snap(1, 1));
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[tokio::test]
    async fn one_dead_observer_does_not_block_the_rest() {
        let broadcaster = Broadcaster::new();
        let (_dead, dead_rx) = broadcaster.register();
        let (_live, mut live_rx) = broadcaster.register();
        drop(dead_rx);

        broadcaster.publish(snap(4, 4));
        assert_eq!(live_rx.recv().await, Some(snap(4, 4)));
    }
}
