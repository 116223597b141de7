use std::{fmt, sync::Arc, time::Duration};

use labscan_model::{CollectorKind, Target};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::service::{ScanReport, ScanService};

/// Triggers scan cycles on a fixed interval until cancelled.
pub struct ScanScheduler {
    service: Arc<ScanService>,
    targets: Vec<Target>,
    collectors: Vec<CollectorKind>,
    on_report: Option<Box<dyn Fn(&ScanReport) + Send + Sync>>,
}

impl fmt::Debug for ScanScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanScheduler")
            .field("service", &self.service)
            .field("targets", &self.targets.len())
            .field("collectors", &self.collectors)
            .finish()
    }
}

impl ScanScheduler {
    pub fn new(
        service: Arc<ScanService>,
        targets: Vec<Target>,
        collectors: Vec<CollectorKind>,
    ) -> Self {
        Self {
            service,
            targets,
            collectors,
            on_report: None,
        }
    }

    /// Called with the report of every successful cycle.
    pub fn on_report(
        mut self,
        callback: impl Fn(&ScanReport) + Send + Sync + 'static,
    ) -> Self {
        self.on_report = Some(Box::new(callback));
        self
    }

    /// Runs the first cycle immediately and then once per `interval`.
    /// A failing cycle is logged and the loop continues. Cancelling `cancel`
    /// stops the loop and is forwarded to an in-flight scan. Returns the
    /// number of cycles that produced a report.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut completed = 0;

        info!(
            target: "scan::summary",
            interval_secs = interval.as_secs(),
            targets = self.targets.len(),
            "scan scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self
                .service
                .scan_and_compare(&self.targets, &self.collectors, cancel.child_token())
                .await
            {
                Ok(report) => {
                    completed += 1;
                    if let Some(callback) = &self.on_report {
                        callback(&report);
                    }
                }
                Err(err) => {
                    error!(target: "scan::summary", %err, "scheduled scan failed");
                }
            }
        }

        info!(target: "scan::summary", cycles = completed, "scan scheduler stopped");
        completed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use labscan_model::HostFacts;

    use super::*;
    use crate::{
        collector::{Collector, CollectorError, CollectorOutput, CollectorRegistry},
        config::OrchestratorConfig,
        orchestrator::ScanOrchestrator,
        store::{InMemorySnapshotStore, SnapshotStore},
    };

    struct Facts;

    #[async_trait]
    impl Collector for Facts {
        fn kind(&self) -> CollectorKind {
            CollectorKind::HostFacts
        }

        async fn collect(
            &self,
            _target: &Target,
            _timeout: Duration,
        ) -> Result<CollectorOutput, CollectorError> {
            Ok(CollectorOutput::new(HostFacts::default()))
        }
    }

    fn service(store: Arc<InMemorySnapshotStore>) -> Arc<ScanService> {
        let orchestrator = ScanOrchestrator::new(
            CollectorRegistry::new().with(Arc::new(Facts)),
            OrchestratorConfig::default(),
        )
        .unwrap();
        Arc::new(ScanService::new(Arc::new(orchestrator), store))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_interval_until_cancelled() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let scheduler = ScanScheduler::new(
            service(store.clone()),
            vec![Target::new("srv1", "srv1.lan")],
            vec![CollectorKind::HostFacts],
        )
        .on_report(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            stop.cancel();
        });

        // Ticks at 0s, 60s and 120s.
        let cycles = scheduler.run(Duration::from_secs(60), cancel).await;
        assert_eq!(cycles, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_do_not_stop_the_loop() {
        let store = Arc::new(InMemorySnapshotStore::new());
        // No targets: every cycle is rejected before scanning.
        let scheduler =
            ScanScheduler::new(service(store.clone()), Vec::new(), vec![CollectorKind::HostFacts]);

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            stop.cancel();
        });

        let cycles = scheduler.run(Duration::from_secs(10), cancel).await;
        assert_eq!(cycles, 0);
        assert!(store.is_empty().await);
    }
}
