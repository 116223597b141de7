use labscan_model::{CollectorKind, SnapshotId, TargetId};
use thiserror::Error;

/// Invalid tuning parameters, reported before any work starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("retry max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff multiplier must be >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("backoff_max_ms ({max_ms}) must not be below backoff_base_ms ({base_ms})")]
    BackoffCeiling { base_ms: u64, max_ms: u64 },

    #[error("jitter ratio must be within [0, 1], got {0}")]
    InvalidJitter(f64),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("max_in_flight must be at least 1")]
    ZeroConcurrency,
}

/// Invariant violations that stop a scan before it starts. Remote failures
/// never end up here; they are recorded in the snapshot instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("scan requires at least one target")]
    NoTargets,

    #[error("scan requires at least one collector")]
    NoCollectors,

    #[error("no collector registered for kind {0}")]
    UnknownCollector(CollectorKind),

    #[error("target {0} is declared more than once")]
    DuplicateTarget(TargetId),

    #[error("invalid orchestrator configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot {0} already stored")]
    Duplicate(SnapshotId),

    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),

    #[error("corrupt snapshot file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// The two snapshots cannot be compared. Distinct from an empty change set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiffError {
    #[error("snapshot schema {previous} is not comparable with schema {current}")]
    IncompatibleSchema { previous: u32, current: u32 },

    #[error("previous snapshot {previous} was created after current snapshot {current}")]
    OutOfOrder {
        previous: SnapshotId,
        current: SnapshotId,
    },
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Diff(#[from] DiffError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
