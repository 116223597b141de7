//! Shared fixtures for core integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use labscan_core::{
    Collector, CollectorError, CollectorOutput, CollectorRegistry, OrchestratorConfig,
    RetryConfig, ScanOrchestrator,
};
use labscan_model::{
    CollectorKind, ContainerInventory, ContainerRecord, Criticality, HostFacts, Payload,
    Target, TargetId,
};

/// What a fixture collector answers for one target.
#[derive(Debug, Clone)]
pub enum Response {
    Data(Payload),
    Fail(CollectorError),
    /// Never answers within any sane timeout.
    Hang,
}

/// Collector whose answers are scripted per target and can be changed
/// between scans.
#[derive(Debug)]
pub struct FixtureCollector {
    kind: CollectorKind,
    responses: Mutex<HashMap<TargetId, Response>>,
    calls: AtomicU32,
}

impl FixtureCollector {
    pub fn new(kind: CollectorKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            responses: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn set(&self, target: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(TargetId::from(target), response);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FixtureCollector {
    fn kind(&self) -> CollectorKind {
        self.kind
    }

    async fn collect(
        &self,
        target: &Target,
        _timeout: Duration,
    ) -> Result<CollectorOutput, CollectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().unwrap().get(&target.id).cloned();
        match response {
            Some(Response::Data(payload)) => Ok(CollectorOutput::new(payload)),
            Some(Response::Fail(err)) => Err(err),
            Some(Response::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(CollectorError::Timeout("fixture hang".into()))
            }
            None => Err(CollectorError::Unreachable(format!(
                "no fixture response for {}",
                target.id
            ))),
        }
    }
}

pub fn host_facts(hostname: &str) -> Payload {
    HostFacts {
        hostname: Some(hostname.to_string()),
        os_name: Some("Debian GNU/Linux".into()),
        os_version: Some("12".into()),
        kernel_version: Some("6.1.0-18-amd64".into()),
        architecture: Some("x86_64".into()),
        cpu_cores: Some(8),
        memory_total_mb: Some(32_768),
        docker_version: Some("27.3.1".into()),
        ..Default::default()
    }
    .into()
}

pub fn containers(records: Vec<ContainerRecord>) -> Payload {
    ContainerInventory {
        containers: records,
    }
    .into()
}

pub fn target(id: &str, criticality: Criticality) -> Target {
    Target::new(id, format!("{id}.lan")).with_criticality(criticality)
}

/// Fast retry settings; backoff is deterministic (no jitter).
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_in_flight: 4,
        item_deadline_ms: 5_000,
        retry: RetryConfig {
            max_attempts: 3,
            backoff_base_ms: 100,
            backoff_multiplier: 2.0,
            backoff_max_ms: 1_000,
            jitter_ratio: 0.0,
            attempt_timeout_ms: 1_000,
        },
        exclusions: Vec::new(),
    }
}

pub fn orchestrator(
    collectors: &[Arc<FixtureCollector>],
    config: OrchestratorConfig,
) -> ScanOrchestrator {
    let mut registry = CollectorRegistry::new();
    for collector in collectors {
        registry.register(collector.clone());
    }
    ScanOrchestrator::new(registry, config).expect("valid orchestrator config")
}
