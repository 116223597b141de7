//! The scan pipeline: scan, store, compare, publish.

use std::{fmt, sync::Arc};

use labscan_model::{ChangeSet, CollectorKind, Snapshot, SnapshotId, Target};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    diff::diff,
    error::{DiffError, Result, StoreError},
    events::{ScanEvent, ScanEventPublisher},
    orchestrator::ScanOrchestrator,
    store::SnapshotStore,
};

/// Result of one scan cycle handed to downstream consumers.
///
/// The snapshot is stored even when the comparison fails, so `comparison`
/// carries the diff outcome separately instead of failing the whole cycle.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub snapshot: Arc<Snapshot>,
    /// Snapshot the new one was compared against, if any.
    pub previous: Option<SnapshotId>,
    pub comparison: std::result::Result<Arc<ChangeSet>, DiffError>,
}

impl ScanReport {
    pub fn changes(&self) -> Option<&ChangeSet> {
        self.comparison.as_ref().ok().map(Arc::as_ref)
    }

    pub fn is_baseline(&self) -> bool {
        self.previous.is_none()
    }
}

pub struct ScanService {
    orchestrator: Arc<ScanOrchestrator>,
    store: Arc<dyn SnapshotStore>,
    events: Option<Arc<dyn ScanEventPublisher>>,
}

impl fmt::Debug for ScanService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanService")
            .field("orchestrator", &self.orchestrator)
            .field("store", &std::any::type_name_of_val(&*self.store))
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl ScanService {
    pub fn new(orchestrator: Arc<ScanOrchestrator>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            orchestrator,
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ScanEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
        &self.orchestrator
    }

    /// Runs a scan, appends the snapshot and compares it with the snapshot
    /// that was latest before the scan.
    pub async fn scan_and_compare(
        &self,
        targets: &[Target],
        collectors: &[CollectorKind],
        cancel: CancellationToken,
    ) -> Result<ScanReport> {
        let prior = self.store.latest().await?;
        let snapshot = self
            .orchestrator
            .run_scan_with_cancel(targets, collectors, cancel)
            .await?;
        let snapshot = self.store.append(snapshot).await?;
        self.publish(ScanEvent::SnapshotAppended(snapshot.meta()));

        let comparison = diff(prior.as_deref(), &snapshot).map(Arc::new);
        match &comparison {
            Ok(changes) => {
                let summary = changes.summary();
                info!(
                    target: "scan::diff",
                    from = ?changes.previous_id(),
                    to = %changes.current_id(),
                    total = summary.total,
                    critical = summary.critical,
                    warning = summary.warning,
                    info = summary.info,
                    "changes detected"
                );
                self.publish(ScanEvent::ChangesDetected(Arc::clone(changes)));
            }
            Err(err) => {
                warn!(target: "scan::diff", snapshot = %snapshot.id(), %err, "comparison failed");
                self.publish(ScanEvent::ComparisonFailed {
                    snapshot: snapshot.id(),
                    reason: err.to_string(),
                });
            }
        }

        Ok(ScanReport {
            previous: prior.map(|p| p.id()),
            snapshot,
            comparison,
        })
    }

    /// Compares two stored snapshots.
    pub async fn compare(&self, from: SnapshotId, to: SnapshotId) -> Result<ChangeSet> {
        let previous = self
            .store
            .get(from)
            .await?
            .ok_or(StoreError::NotFound(from))?;
        let current = self.store.get(to).await?.ok_or(StoreError::NotFound(to))?;
        Ok(diff(Some(&previous), &current)?)
    }

    /// Compares the latest snapshot with the one before it. A single stored
    /// snapshot yields its baseline; an empty store yields `None`.
    pub async fn compare_latest(&self) -> Result<Option<ChangeSet>> {
        let Some(latest) = self.store.latest().await? else {
            return Ok(None);
        };
        let previous = self.store.previous(latest.id()).await?;
        Ok(Some(diff(previous.as_deref(), &latest)?))
    }

    fn publish(&self, event: ScanEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use labscan_model::{ChangeKind, Criticality, HostFacts};

    use super::*;
    use crate::{
        collector::{Collector, CollectorError, CollectorOutput, CollectorRegistry},
        config::OrchestratorConfig,
        error::ServiceError,
        events::ScanEventBus,
        store::InMemorySnapshotStore,
    };

    struct Kernel(&'static str);

    #[async_trait]
    impl Collector for Kernel {
        fn kind(&self) -> CollectorKind {
            CollectorKind::HostFacts
        }

        async fn collect(
            &self,
            target: &Target,
            _timeout: Duration,
        ) -> std::result::Result<CollectorOutput, CollectorError> {
            Ok(CollectorOutput::new(HostFacts {
                hostname: Some(target.hostname.clone()),
                kernel_version: Some(self.0.to_string()),
                ..Default::default()
            }))
        }
    }

    fn service(kernel: &'static str, store: Arc<InMemorySnapshotStore>) -> ScanService {
        let registry = CollectorRegistry::new().with(Arc::new(Kernel(kernel)));
        let orchestrator =
            ScanOrchestrator::new(registry, OrchestratorConfig::default()).unwrap();
        ScanService::new(Arc::new(orchestrator), store)
    }

    fn targets() -> Vec<Target> {
        vec![Target::new("srv1", "srv1.lan").with_criticality(Criticality::Critical)]
    }

    #[tokio::test]
    async fn first_scan_is_a_baseline_then_changes_are_detected() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let bus = Arc::new(ScanEventBus::new(16));
        let mut events = bus.subscribe();

        let first = service("6.8", store.clone())
            .with_events(bus.clone())
            .scan_and_compare(&targets(), &[CollectorKind::HostFacts], CancellationToken::new())
            .await
            .unwrap();
        assert!(first.is_baseline());
        let baseline = first.changes().unwrap();
        assert_eq!(baseline.len(), 1);
        assert_eq!(baseline.entries()[0].kind, ChangeKind::Added);

        let second = service("6.9", store.clone())
            .scan_and_compare(&targets(), &[CollectorKind::HostFacts], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.previous, Some(first.snapshot.id()));
        let changes = second.changes().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.entries()[0].field_path.as_deref(),
            Some("kernel_version")
        );
        assert_eq!(store.len().await, 2);

        assert!(matches!(
            events.recv().await.unwrap(),
            ScanEvent::SnapshotAppended(meta) if meta.id == first.snapshot.id()
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            ScanEvent::ChangesDetected(set) if set.is_baseline()
        ));
    }

    #[tokio::test]
    async fn compare_and_compare_latest_read_from_the_store() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let svc = service("6.8", store.clone());
        assert!(svc.compare_latest().await.unwrap().is_none());

        let first = svc
            .scan_and_compare(&targets(), &[CollectorKind::HostFacts], CancellationToken::new())
            .await
            .unwrap();
        assert!(svc.compare_latest().await.unwrap().unwrap().is_baseline());

        let second = svc
            .scan_and_compare(&targets(), &[CollectorKind::HostFacts], CancellationToken::new())
            .await
            .unwrap();
        let changes = svc
            .compare(first.snapshot.id(), second.snapshot.id())
            .await
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(changes.previous_id(), Some(first.snapshot.id()));

        let missing = SnapshotId::new();
        let err = svc.compare(missing, second.snapshot.id()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn invalid_scan_input_stores_nothing() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let err = service("6.8", store.clone())
            .scan_and_compare(&[], &[CollectorKind::HostFacts], CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Scan(_)));
        assert!(store.is_empty().await);
    }
}
