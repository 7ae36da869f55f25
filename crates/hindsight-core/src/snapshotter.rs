//! Event-driven snapshot persistence.
//!
//! Foreground handlers push one notification per completed request/reply
//! cycle through an [`UpdateNotifier`]. The [`Snapshotter`] task waits on
//! those notifications and performs a full save for each; notifications that
//! arrive while the channel is full are coalesced into the pending one. On
//! cancellation the task saves once more and exits.
//!
//! Saves from the snapshotter and the sweeper go through one
//! [`SnapshotPersister`], which serializes them so files are written in the
//! order their copies were taken.

use std::sync::Arc;

use hindsight_types::error::SnapshotError;
use hindsight_types::snapshot::StoreStats;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::snapshot::SnapshotStore;
use crate::store::RootStore;

// ---------------------------------------------------------------------------
// Update notifications
// ---------------------------------------------------------------------------

/// Sending half of the update channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpdateNotifier {
    sender: mpsc::Sender<()>,
}

impl UpdateNotifier {
    /// Request a save. Never blocks.
    pub fn notify(&self) {
        match self.sender.try_send(()) {
            Ok(()) => debug!("snapshot requested"),
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("snapshot already pending, request coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("snapshotter stopped, request dropped");
            }
        }
    }
}

/// Receiving half of the update channel, consumed by [`Snapshotter`].
#[derive(Debug)]
pub struct UpdateReceiver {
    receiver: mpsc::Receiver<()>,
}

impl UpdateReceiver {
    async fn recv(&mut self) -> Option<()> {
        let update = self.receiver.recv().await;
        // One save covers everything queued so far.
        while self.take_pending() {}
        update
    }

    /// Consume a pending request without waiting. Returns whether one was queued.
    pub fn take_pending(&mut self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}

/// Create an update channel holding at most `capacity` pending requests.
pub fn update_channel(capacity: usize) -> (UpdateNotifier, UpdateReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (UpdateNotifier { sender }, UpdateReceiver { receiver })
}

// ---------------------------------------------------------------------------
// SnapshotPersister
// ---------------------------------------------------------------------------

/// Copies the store and hands the copy to a [`SnapshotStore`].
pub struct SnapshotPersister<S: SnapshotStore> {
    store: Arc<RootStore>,
    backend: S,
    write_lock: Mutex<()>,
}

impl<S: SnapshotStore> SnapshotPersister<S> {
    pub fn new(store: Arc<RootStore>, backend: S) -> Self {
        Self {
            store,
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &RootStore {
        &self.store
    }

    /// Take a consistent copy and write it.
    ///
    /// Store locks are released before the backend encodes or writes.
    pub async fn save(&self) -> Result<StoreStats, SnapshotError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot();
        self.backend.save(&snapshot).await?;
        Ok(snapshot.stats())
    }

    /// Save and log the outcome. A failed save is retried by the next trigger.
    pub async fn save_logged(&self) -> bool {
        match self.save().await {
            Ok(stats) => {
                info!(
                    agents = stats.agents,
                    conversations = stats.conversations,
                    lines = stats.lines,
                    reply_links = stats.reply_links,
                    "snapshot saved"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "snapshot save failed, keeping in-memory state");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshotter task
// ---------------------------------------------------------------------------

pub struct Snapshotter<S: SnapshotStore> {
    persister: Arc<SnapshotPersister<S>>,
    updates: UpdateReceiver,
}

impl<S: SnapshotStore> Snapshotter<S> {
    pub fn new(persister: Arc<SnapshotPersister<S>>, updates: UpdateReceiver) -> Self {
        Self { persister, updates }
    }

    /// Save on every notification until `cancel` fires or every notifier is
    /// dropped, then save once more.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("snapshotter started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                update = self.updates.recv() => {
                    if update.is_none() {
                        debug!("all notifiers dropped");
                        break;
                    }
                    self.persister.save_logged().await;
                }
            }
        }

        self.persister.save_logged().await;
        info!("snapshotter shut down");
    }
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Load the saved store, or provision an empty one.
///
/// A missing snapshot and an unreadable one both yield an empty store with
/// the configured shared queues; only the latter is logged as a warning.
pub async fn restore_store<S: SnapshotStore>(
    backend: &S,
    shared_conversation_ids: &[i64],
) -> RootStore {
    let shared = shared_conversation_ids.iter().copied();
    match backend.load().await {
        Ok(Some(snapshot)) => {
            let store = RootStore::from_snapshot(snapshot, shared);
            let stats = store.stats();
            info!(
                agents = stats.agents,
                conversations = stats.conversations,
                lines = stats.lines,
                "snapshot restored"
            );
            store
        }
        Ok(None) => {
            info!("no snapshot found, starting empty");
            RootStore::new(shared)
        }
        Err(e) => {
            warn!(error = %e, "failed to load snapshot, starting empty");
            RootStore::new(shared)
        }
    }
}
