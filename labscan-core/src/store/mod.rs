//! Append-only snapshot storage.
//!
//! Snapshots are never updated or deleted once appended; a newer snapshot
//! supersedes an older one. Readers never observe a half-written snapshot.

mod json_dir;
mod memory;

pub use json_dir::JsonDirSnapshotStore;
pub use memory::InMemorySnapshotStore;

use std::sync::Arc;

use async_trait::async_trait;
use labscan_model::{Snapshot, SnapshotId, SnapshotMeta};

use crate::error::StoreError;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stores `snapshot`. Fails with [`StoreError::Duplicate`] if a snapshot
    /// with the same id is already present.
    async fn append(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, StoreError>;

    /// Most recently created snapshot.
    async fn latest(&self) -> Result<Option<Arc<Snapshot>>, StoreError>;

    async fn get(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError>;

    /// Snapshot created immediately before `id`. `NotFound` if `id` itself
    /// is unknown.
    async fn previous(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError>;

    /// Metadata of every stored snapshot, oldest first.
    async fn list(&self) -> Result<Vec<SnapshotMeta>, StoreError>;
}
