//! Fans collector runs out across targets and assembles one snapshot.
//!
//! Every (target, collector) pair becomes a work item running in its own
//! task. A semaphore caps how many items talk to remote endpoints at once,
//! each item runs under the retry policy and an overall deadline, and the
//! snapshot is assembled only once the task set is fully drained. Remote
//! failures never escape as errors: they become `failed` results.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use labscan_model::{
    CollectorKind, Criticality, FailureCause, PartialResult, ResultStatus,
    Snapshot, Target, WorkItemKey,
};
use tokio::{sync::Semaphore, task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, info, info_span, warn};

use crate::{
    collector::{Collector, CollectorOutput, CollectorRegistry},
    config::OrchestratorConfig,
    error::{ConfigError, ScanError},
    events::{ScanEvent, ScanEventPublisher},
    retry::{Attempted, RetryPolicy},
};

struct WorkItem {
    key: WorkItemKey,
    criticality: Criticality,
    target: Arc<Target>,
    collector: Arc<dyn Collector>,
}

pub struct ScanOrchestrator {
    registry: CollectorRegistry,
    config: OrchestratorConfig,
    retry: RetryPolicy,
    events: Option<Arc<dyn ScanEventPublisher>>,
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl ScanOrchestrator {
    pub fn new(
        registry: CollectorRegistry,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let retry = RetryPolicy::new(config.retry)?;
        Ok(Self {
            registry,
            config,
            retry,
            events: None,
        })
    }

    /// Publishes scan start and per-item outcomes to `events`.
    pub fn with_events(mut self, events: Arc<dyn ScanEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub async fn run_scan(
        &self,
        targets: &[Target],
        collectors: &[CollectorKind],
    ) -> Result<Snapshot, ScanError> {
        self.run_scan_with_cancel(targets, collectors, CancellationToken::new())
            .await
    }

    /// Runs one scan cycle. Once `cancel` fires no further items are
    /// launched; items already running finish within their own time limit
    /// and the snapshot is marked cancelled.
    pub async fn run_scan_with_cancel(
        &self,
        targets: &[Target],
        collectors: &[CollectorKind],
        cancel: CancellationToken,
    ) -> Result<Snapshot, ScanError> {
        let work = self.plan(targets, collectors)?;
        let started_at = Utc::now();

        info!(
            target: "scan::summary",
            targets = targets.len(),
            items = work.len(),
            max_in_flight = self.config.max_in_flight,
            "scan started"
        );
        self.publish(ScanEvent::Started {
            work_items: work.len(),
            started_at,
        });

        let span = info_span!(target: "scan::summary", "scan", items = work.len());
        let results = self.execute(work, cancel).instrument(span).await;
        let snapshot = Snapshot::assemble(started_at, results);

        let stats = snapshot.stats();
        info!(
            target: "scan::summary",
            snapshot = %snapshot.id(),
            ok = stats.ok,
            partial = stats.partial,
            failed = stats.failed,
            cancelled = snapshot.is_cancelled(),
            duration_ms = stats.duration_ms,
            "scan complete"
        );

        Ok(snapshot)
    }

    /// Validates inputs and expands them into the ordered work list: targets
    /// in the given order, collectors in the given order within a target.
    fn plan(
        &self,
        targets: &[Target],
        collectors: &[CollectorKind],
    ) -> Result<Vec<WorkItem>, ScanError> {
        if targets.is_empty() {
            return Err(ScanError::NoTargets);
        }
        if collectors.is_empty() {
            return Err(ScanError::NoCollectors);
        }

        let mut resolved: Vec<(CollectorKind, Arc<dyn Collector>)> =
            Vec::with_capacity(collectors.len());
        for &kind in collectors {
            if resolved.iter().any(|(seen, _)| *seen == kind) {
                continue;
            }
            let collector = self
                .registry
                .get(kind)
                .ok_or(ScanError::UnknownCollector(kind))?;
            resolved.push((kind, collector));
        }

        let mut seen = HashSet::with_capacity(targets.len());
        for target in targets {
            if !seen.insert(&target.id) {
                return Err(ScanError::DuplicateTarget(target.id.clone()));
            }
        }

        let mut work = Vec::with_capacity(targets.len() * resolved.len());
        for target in targets {
            let shared = Arc::new(target.clone());
            let criticality = target.effective_criticality();
            for (kind, collector) in &resolved {
                if self.config.is_excluded(&target.id, *kind) {
                    debug!(target: "scan::item", target_id = %target.id, collector = %kind, "excluded by configuration");
                    continue;
                }
                if !collector.applies_to(target) {
                    debug!(target: "scan::item", target_id = %target.id, collector = %kind, "collector not applicable");
                    continue;
                }
                work.push(WorkItem {
                    key: WorkItemKey::new(target.id.clone(), *kind),
                    criticality,
                    target: Arc::clone(&shared),
                    collector: Arc::clone(collector),
                });
            }
        }

        Ok(work)
    }

    async fn execute(
        &self,
        work: Vec<WorkItem>,
        cancel: CancellationToken,
    ) -> Vec<PartialResult> {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight));
        let deadline = self.config.item_deadline();
        let meta: Vec<(WorkItemKey, Criticality)> = work
            .iter()
            .map(|item| (item.key.clone(), item.criticality))
            .collect();
        let mut slots: Vec<Option<PartialResult>> = vec![None; work.len()];
        let mut index_by_task = HashMap::with_capacity(work.len());
        let mut tasks = JoinSet::new();

        for (index, item) in work.into_iter().enumerate() {
            let span = debug_span!(target: "scan::item", "item", key = %item.key);
            let handle = tasks.spawn(
                run_item(item, Arc::clone(&permits), self.retry, deadline, cancel.clone())
                    .instrument(span),
            );
            index_by_task.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, result) = match joined {
                Ok((id, result)) => match index_by_task.get(&id) {
                    Some(&index) => (index, result),
                    None => continue,
                },
                Err(err) => {
                    let Some(&index) = index_by_task.get(&err.id()) else {
                        continue;
                    };
                    let (key, criticality) = &meta[index];
                    let (cause, reason) = if err.is_panic() {
                        (
                            FailureCause::Panicked,
                            format!("collector panicked: {}", panic_message(err)),
                        )
                    } else {
                        (
                            FailureCause::Cancelled,
                            "collector task was aborted".to_string(),
                        )
                    };
                    (
                        index,
                        PartialResult::failed(key.clone(), *criticality, cause, reason, 0, 0),
                    )
                }
            };

            self.report(&result);
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .zip(meta)
            .map(|(slot, (key, criticality))| {
                slot.unwrap_or_else(|| {
                    PartialResult::failed(
                        key,
                        criticality,
                        FailureCause::Cancelled,
                        "work item never reported an outcome",
                        0,
                        0,
                    )
                })
            })
            .collect()
    }

    fn report(&self, result: &PartialResult) {
        let key = result.key();
        match result.status() {
            ResultStatus::Failed => warn!(
                target: "scan::item",
                key = %key,
                cause = ?result.cause(),
                attempts = result.attempts(),
                error = result.error().unwrap_or_default(),
                "work item failed"
            ),
            ResultStatus::Partial => debug!(
                target: "scan::item",
                key = %key,
                attempts = result.attempts(),
                warnings = result.error().unwrap_or_default(),
                "work item returned partial data"
            ),
            ResultStatus::Ok => debug!(
                target: "scan::item",
                key = %key,
                attempts = result.attempts(),
                elapsed_ms = result.elapsed_ms(),
                "work item complete"
            ),
        }

        self.publish(ScanEvent::ItemFinished {
            key,
            status: result.status(),
            attempts: result.attempts(),
            elapsed_ms: result.elapsed_ms(),
        });
    }

    fn publish(&self, event: ScanEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

async fn run_item(
    item: WorkItem,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    deadline: Duration,
    cancel: CancellationToken,
) -> PartialResult {
    let WorkItem {
        key,
        criticality,
        target,
        collector,
    } = item;

    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return PartialResult::failed(
                key,
                criticality,
                FailureCause::Cancelled,
                "scan cancelled before the item was launched",
                0,
                0,
            );
        }
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                return PartialResult::failed(
                    key,
                    criticality,
                    FailureCause::Cancelled,
                    "concurrency limiter closed",
                    0,
                    0,
                );
            }
        },
    };

    let started = Instant::now();
    let attempts_made = AtomicU32::new(0);
    let attempt_timeout = retry.config().attempt_timeout();

    let outcome = tokio::time::timeout(
        deadline,
        retry.execute(|attempt| {
            attempts_made.store(attempt, Ordering::Relaxed);
            let target = Arc::clone(&target);
            let collector = Arc::clone(&collector);
            async move { collector.collect(&target, attempt_timeout).await }
        }),
    )
    .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(Attempted { value, attempts })) => {
            into_result(key, criticality, value, attempts, elapsed_ms)
        }
        Ok(Err(exhausted)) => PartialResult::failed(
            key,
            criticality,
            FailureCause::Collector,
            exhausted.last_error.to_string(),
            exhausted.attempts,
            elapsed_ms,
        ),
        Err(_) => PartialResult::failed(
            key,
            criticality,
            FailureCause::Timeout,
            format!("no outcome within the {} ms item deadline", deadline.as_millis()),
            attempts_made.load(Ordering::Relaxed),
            elapsed_ms,
        ),
    }
}

fn into_result(
    key: WorkItemKey,
    criticality: Criticality,
    output: CollectorOutput,
    attempts: u32,
    elapsed_ms: u64,
) -> PartialResult {
    let domain = output.payload.domain();
    if domain != key.collector {
        let reason = format!(
            "collector returned a {domain} payload for a {} work item",
            key.collector
        );
        return PartialResult::failed(
            key,
            criticality,
            FailureCause::Collector,
            reason,
            attempts,
            elapsed_ms,
        );
    }

    if output.warnings.is_empty() {
        PartialResult::ok(key.target, criticality, output.payload, attempts, elapsed_ms)
    } else {
        PartialResult::partial(
            key.target,
            criticality,
            output.payload,
            output.warnings.join("; "),
            attempts,
            elapsed_ms,
        )
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
