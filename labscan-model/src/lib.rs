//! Core data model definitions shared across labscan crates.
//!
//! Everything here is plain data: targets as configured, the typed payloads
//! collectors produce, the snapshots the orchestrator assembles, and the
//! change sets the detector derives from two snapshots. Behaviour lives in
//! `labscan-core`.

pub mod change;
pub mod domain;
pub mod error;
pub mod ids;
pub mod payload;
pub mod redact;
pub mod snapshot;
pub mod target;

pub use change::{ChangeEntry, ChangeKind, ChangeSet, ChangeSummary, Severity};
pub use domain::{CollectorKind, WorkItemKey};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{SnapshotId, TargetId};
pub use payload::{
    ComposeServiceRecord, ComposeStackRecord, ComposeTopology,
    ContainerInventory, ContainerRecord, HostFacts, PAYLOAD_SCHEMA_VERSION,
    Payload, PortMapping, RunState,
};
pub use snapshot::{
    FailureCause, PartialResult, ResultStatus, SNAPSHOT_SCHEMA_VERSION,
    Snapshot, SnapshotMeta, SnapshotStats,
};
pub use target::{
    ConnectionRef, Criticality, ServerRole, Target, TargetAddress,
    TransportKind,
};
