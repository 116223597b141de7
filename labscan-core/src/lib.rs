//! Scan orchestration and change detection for labscan.
//!
//! A scan fans collectors out over the configured targets
//! ([`ScanOrchestrator`]), folds every outcome into one immutable
//! [`Snapshot`](labscan_model::Snapshot), appends it to a [`SnapshotStore`]
//! and compares it with its predecessor ([`diff`]). [`ScanService`] wires
//! these steps together for CLI, scheduler or HTTP callers.

pub mod alerts;
pub mod collector;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod store;

pub use alerts::{AlertDecision, AlertPolicy, AlertPriority, AlertReason, AlertTrigger};
pub use collector::{Collector, CollectorError, CollectorOutput, CollectorRegistry};
pub use config::{Exclusion, OrchestratorConfig, RetryConfig};
pub use diff::diff;
pub use error::{ConfigError, DiffError, ScanError, ServiceError, StoreError};
pub use events::{ScanEvent, ScanEventBus, ScanEventPublisher};
pub use orchestrator::ScanOrchestrator;
pub use retry::{AttemptError, Attempted, RetryExhausted, RetryPolicy, Retryable};
pub use scheduler::ScanScheduler;
pub use service::{ScanReport, ScanService};
pub use store::{InMemorySnapshotStore, JsonDirSnapshotStore, SnapshotStore};

pub use labscan_model as model;
