use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use labscan_model::{Snapshot, SnapshotId, SnapshotMeta};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, error};
use uuid::Uuid;

use super::SnapshotStore;
use crate::error::StoreError;

const EXTENSION: &str = "json";

/// One pretty-printed JSON file per snapshot, named
/// `<created_at>-<id>.json` so that a lexical sort of the directory is a
/// chronological one.
///
/// Writes go to a temp file that is renamed into place, so readers only ever
/// see complete files. Anything not ending in `.json` is ignored.
#[derive(Debug)]
pub struct JsonDirSnapshotStore {
    root: PathBuf,
    append_lock: Mutex<()>,
}

impl JsonDirSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            error!(root = ?self.root, %err, "failed to create snapshot dir");
            StoreError::Io(err)
        })
    }

    fn file_name(snapshot: &Snapshot) -> String {
        format!(
            "{}-{}.{EXTENSION}",
            snapshot.created_at().format("%Y%m%dT%H%M%S%6fZ"),
            snapshot.id()
        )
    }

    /// Final snapshot files, oldest first.
    async fn entries(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION)
                && entry.file_type().await?.is_file()
            {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn matches_id(path: &Path, id: SnapshotId) -> bool {
        let suffix = format!("-{id}.{EXTENSION}");
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&suffix))
    }

    async fn read(path: &Path) -> Result<Arc<Snapshot>, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        Ok(Arc::new(snapshot))
    }
}

#[async_trait]
impl SnapshotStore for JsonDirSnapshotStore {
    async fn append(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, StoreError> {
        let _guard = self.append_lock.lock().await;
        self.ensure_root().await?;

        let id = snapshot.id();
        if self
            .entries()
            .await?
            .iter()
            .any(|path| Self::matches_id(path, id))
        {
            return Err(StoreError::Duplicate(id));
        }

        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let name = Self::file_name(&snapshot);
        let path = self.root.join(&name);
        let tmp = self
            .root
            .join(format!("{name}.tmp-{}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            error!(?tmp, ?path, %err, "failed to move snapshot into place");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        debug!(snapshot = %id, ?path, bytes = bytes.len(), "snapshot stored");
        Ok(Arc::new(snapshot))
    }

    async fn latest(&self) -> Result<Option<Arc<Snapshot>>, StoreError> {
        match self.entries().await?.last() {
            Some(path) => Ok(Some(Self::read(path).await?)),
            None => Ok(None),
        }
    }

    async fn get(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError> {
        let entries = self.entries().await?;
        match entries.iter().find(|path| Self::matches_id(path, id)) {
            Some(path) => Ok(Some(Self::read(path).await?)),
            None => Ok(None),
        }
    }

    async fn previous(&self, id: SnapshotId) -> Result<Option<Arc<Snapshot>>, StoreError> {
        let entries = self.entries().await?;
        let at = entries
            .iter()
            .position(|path| Self::matches_id(path, id))
            .ok_or(StoreError::NotFound(id))?;
        match at.checked_sub(1) {
            Some(prev) => Ok(Some(Self::read(&entries[prev]).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<SnapshotMeta>, StoreError> {
        let mut metas = Vec::new();
        for path in self.entries().await? {
            metas.push(Self::read(&path).await?.meta());
        }
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use labscan_model::{Criticality, HostFacts, PartialResult};
    use tempfile::tempdir;

    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot::assemble(
            Utc::now(),
            vec![PartialResult::ok(
                "srv1".into(),
                Criticality::Critical,
                HostFacts {
                    hostname: Some("srv1".into()),
                    ..Default::default()
                }
                .into(),
                1,
                3,
            )],
        )
    }

    #[tokio::test]
    async fn snapshots_round_trip_through_disk() {
        let dir = tempdir().expect("tempdir");
        let store = JsonDirSnapshotStore::new(dir.path().join("snapshots"));
        assert!(store.latest().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());

        let stored = snapshot();
        store.append(stored.clone()).await.unwrap();

        let loaded = store.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(*loaded, stored);
        assert_eq!(store.latest().await.unwrap().unwrap().id(), stored.id());
    }

    #[tokio::test]
    async fn ordering_and_previous_follow_file_names() {
        let dir = tempdir().expect("tempdir");
        let store = JsonDirSnapshotStore::new(dir.path());

        let first = store.append(snapshot()).await.unwrap();
        let second = store.append(snapshot()).await.unwrap();

        let ids: Vec<SnapshotId> =
            store.list().await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, [first.id(), second.id()]);
        assert_eq!(
            store.previous(second.id()).await.unwrap().unwrap().id(),
            first.id()
        );
        assert!(store.previous(first.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicates_are_rejected_and_temp_files_ignored() {
        let dir = tempdir().expect("tempdir");
        let store = JsonDirSnapshotStore::new(dir.path());
        let stored = snapshot();
        store.append(stored.clone()).await.unwrap();

        let err = store.append(stored.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        tokio::fs::write(dir.path().join("half.json.tmp-abc"), b"{")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"hello")
            .await
            .unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_files_are_reported() {
        let dir = tempdir().expect("tempdir");
        let store = JsonDirSnapshotStore::new(dir.path());
        tokio::fs::write(dir.path().join("20250101T000000000000Z-bad.json"), b"{")
            .await
            .unwrap();
        let err = store.latest().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
