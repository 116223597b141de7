use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use labscan_model::{ChangeSet, ResultStatus, SnapshotId, SnapshotMeta, WorkItemKey};
use tokio::sync::broadcast;

/// Notifications emitted while a scan runs and after its snapshot is stored.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        work_items: usize,
        started_at: DateTime<Utc>,
    },
    ItemFinished {
        key: WorkItemKey,
        status: ResultStatus,
        attempts: u32,
        elapsed_ms: u64,
    },
    SnapshotAppended(SnapshotMeta),
    ChangesDetected(Arc<ChangeSet>),
    ComparisonFailed {
        snapshot: SnapshotId,
        reason: String,
    },
}

pub trait ScanEventPublisher: Send + Sync {
    fn publish(&self, event: ScanEvent);
}

/// In-process fan-out of [`ScanEvent`]s to documentation generators,
/// notifiers and anything else that wants to follow scans. Events sent while
/// nobody is subscribed are dropped.
pub struct ScanEventBus {
    sender: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl fmt::Debug for ScanEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Default for ScanEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ScanEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }
}

impl ScanEventPublisher for ScanEventBus {
    fn publish(&self, event: ScanEvent) {
        let _ = self.sender.send(event);
    }
}
