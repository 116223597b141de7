use std::sync::Arc;

use async_trait::async_trait;
use labscan_model::{Snapshot, SnapshotId, SnapshotMeta};
use tokio::sync::RwLock;

use super::SnapshotStore;
use crate::error::StoreError;

/// Keeps snapshots in memory, ordered by creation time. Useful for tests
/// and for one-shot runs that only need the latest comparison.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<Vec<Arc<Snapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

fn position(snapshots: &[Arc<Snapshot>], id: SnapshotId) -> Option<usize> {
    snapshots.iter().position(|s| s.id() == id)
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn append(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, StoreError> {
        let mut snapshots = self.snapshots.write().await;
        if position(&snapshots, snapshot.id()).is_some() {
            return Err(StoreError::Duplicate(snapshot.id()));
        }

        let snapshot = Arc::new(snapshot);
        let at = snapshots.partition_point(|existing| {
            (existing.created_at(), existing.id()) <= (snapshot.created_at(), snapshot.id())
        });
        snapshots.insert(at, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn latest(&self) -> Result<Option<Arc<Snapshot>>, StoreError> {
        Ok(self.snapshots.read().await.last().cloned())
    }

    async fn get(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(position(&snapshots, id).map(|at| Arc::clone(&snapshots[at])))
    }

    async fn previous(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError> {
        let snapshots = self.snapshots.read().await;
        let at = position(&snapshots, id).ok_or(StoreError::NotFound(id))?;
        Ok(at.checked_sub(1).map(|prev| Arc::clone(&snapshots[prev])))
    }

    async fn list(&self) -> Result<Vec<SnapshotMeta>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .map(|s| s.meta())
            .collect())
    }
}
