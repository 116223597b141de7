//! Snapshots: the atomic, immutable unit of infrastructure state.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    domain::{CollectorKind, WorkItemKey},
    ids::{SnapshotId, TargetId},
    payload::{Payload, RunState},
    target::Criticality,
};

/// Version of the snapshot envelope. Snapshots with different versions are
/// not comparable.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ResultStatus {
    Ok,
    Failed,
    Partial,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Ok => "ok",
            ResultStatus::Failed => "failed",
            ResultStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a work item produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FailureCause {
    /// The collector kept failing until retries ran out, or failed with an
    /// error that is not worth retrying.
    Collector,
    /// The per-item deadline elapsed before any outcome.
    Timeout,
    /// The scan was cancelled before the item was launched.
    Cancelled,
    /// The collector task panicked.
    Panicked,
}

impl FailureCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCause::Collector => "collector",
            FailureCause::Timeout => "timeout",
            FailureCause::Cancelled => "cancelled",
            FailureCause::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one collector run against one target.
///
/// The constructors keep status, payload and error consistent: `ok` carries a
/// payload and no error, `partial` carries both, `failed` carries an error
/// and a cause but no payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartialResult {
    target: TargetId,
    criticality: Criticality,
    domain: CollectorKind,
    status: ResultStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    payload: Option<Payload>,
    #[cfg_attr(feature = "serde", serde(default))]
    error: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    cause: Option<FailureCause>,
    attempts: u32,
    elapsed_ms: u64,
}

impl PartialResult {
    pub fn ok(
        target: TargetId,
        criticality: Criticality,
        payload: Payload,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            target,
            criticality,
            domain: payload.domain(),
            status: ResultStatus::Ok,
            payload: Some(payload),
            error: None,
            cause: None,
            attempts,
            elapsed_ms,
        }
    }

    pub fn partial(
        target: TargetId,
        criticality: Criticality,
        payload: Payload,
        error: impl Into<String>,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            status: ResultStatus::Partial,
            error: Some(error.into()),
            ..Self::ok(target, criticality, payload, attempts, elapsed_ms)
        }
    }

    pub fn failed(
        key: WorkItemKey,
        criticality: Criticality,
        cause: FailureCause,
        error: impl Into<String>,
        attempts: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            target: key.target,
            criticality,
            domain: key.collector,
            status: ResultStatus::Failed,
            payload: None,
            error: Some(error.into()),
            cause: Some(cause),
            attempts,
            elapsed_ms,
        }
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Tier of the originating target at scan time.
    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn domain(&self) -> CollectorKind {
        self.domain
    }

    pub fn key(&self) -> WorkItemKey {
        WorkItemKey::new(self.target.clone(), self.domain)
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cause(&self) -> Option<FailureCause> {
        self.cause
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResultStatus::Failed
    }
}

/// Counters computed once at assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapshotStats {
    pub targets: usize,
    pub work_items: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub containers: usize,
    pub running_containers: usize,
    pub compose_stacks: usize,
    pub duration_ms: u64,
}

impl SnapshotStats {
    fn compute(results: &[PartialResult], duration_ms: u64) -> Self {
        let mut stats = SnapshotStats {
            work_items: results.len(),
            duration_ms,
            ..Default::default()
        };

        let mut targets: Vec<&TargetId> = results.iter().map(|r| &r.target).collect();
        targets.sort();
        targets.dedup();
        stats.targets = targets.len();

        for result in results {
            match result.status {
                ResultStatus::Ok => stats.ok += 1,
                ResultStatus::Partial => stats.partial += 1,
                ResultStatus::Failed => stats.failed += 1,
            }
            match &result.payload {
                Some(Payload::Containers(inv)) => {
                    stats.containers += inv.containers.len();
                    stats.running_containers += inv
                        .containers
                        .iter()
                        .filter(|c| c.state == RunState::Running)
                        .count();
                }
                Some(Payload::Compose(topology)) => {
                    stats.compose_stacks += topology.stacks.len();
                }
                _ => {}
            }
        }

        stats
    }
}

/// Immutable, timestamped aggregate of every collection outcome of one scan
/// cycle. There are no mutators; once assembled a snapshot is only read,
/// stored, and superseded by the next one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    id: SnapshotId,
    schema_version: u32,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    results: Vec<PartialResult>,
    hard_failures: Vec<WorkItemKey>,
    cancelled: bool,
    stats: SnapshotStats,
}

impl Snapshot {
    /// Assembles a snapshot from terminal results. The id and creation
    /// timestamp are taken now, when the results became available, not when
    /// the scan started. Sensitive label and environment values are masked
    /// here so they never reach a store.
    pub fn assemble(started_at: DateTime<Utc>, mut results: Vec<PartialResult>) -> Self {
        for payload in results.iter_mut().filter_map(|r| r.payload.as_mut()) {
            payload.redact_secrets();
        }
        let created_at = Utc::now();
        let duration_ms = (created_at - started_at).num_milliseconds().max(0) as u64;
        let hard_failures = results
            .iter()
            .filter(|r| r.is_failed())
            .map(PartialResult::key)
            .collect();
        let cancelled = results
            .iter()
            .any(|r| r.cause == Some(FailureCause::Cancelled));
        let stats = SnapshotStats::compute(&results, duration_ms);

        Self {
            id: SnapshotId::new(),
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            created_at,
            started_at,
            results,
            hard_failures,
            cancelled,
            stats,
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn results(&self) -> &[PartialResult] {
        &self.results
    }

    /// Work items that never produced data.
    pub fn hard_failures(&self) -> &[WorkItemKey] {
        &self.hard_failures
    }

    /// True when the scan was cancelled before every item was launched.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }

    pub fn failure_count(&self) -> usize {
        self.hard_failures.len()
    }

    /// A snapshot where nothing answered. Still valid data: it documents
    /// total unreachability.
    pub fn is_total_failure(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(PartialResult::is_failed)
    }

    pub fn result_for(
        &self,
        target: &TargetId,
        collector: CollectorKind,
    ) -> Option<&PartialResult> {
        self.results
            .iter()
            .find(|r| &r.target == target && r.domain == collector)
    }

    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id,
            created_at: self.created_at,
            work_items: self.results.len(),
            failed: self.hard_failures.len(),
            cancelled: self.cancelled,
        }
    }
}

/// Lightweight listing entry for stored snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapshotMeta {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub work_items: usize,
    pub failed: usize,
    pub cancelled: bool,
}
