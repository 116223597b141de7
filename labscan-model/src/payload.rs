//! Typed payloads produced by collectors, one record type per domain.
//!
//! Every payload has a fixed field set versioned by
//! [`PAYLOAD_SCHEMA_VERSION`], so snapshots can be compared field by field
//! instead of by generic structural diffing.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::domain::CollectorKind;

/// Version of the field sets below. Bump when a field is added, removed or
/// changes meaning.
pub const PAYLOAD_SCHEMA_VERSION: u32 = 2;

/// Collected data for one (target, collector) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "domain", content = "data", rename_all = "kebab-case")
)]
pub enum Payload {
    HostFacts(HostFacts),
    Containers(ContainerInventory),
    Compose(ComposeTopology),
}

impl Payload {
    pub fn domain(&self) -> CollectorKind {
        match self {
            Payload::HostFacts(_) => CollectorKind::HostFacts,
            Payload::Containers(_) => CollectorKind::Containers,
            Payload::Compose(_) => CollectorKind::Compose,
        }
    }

    /// Number of comparable entities carried by this payload: one for host
    /// facts, one per container, one per compose stack and per compose
    /// service.
    pub fn entity_count(&self) -> usize {
        match self {
            Payload::HostFacts(_) => 1,
            Payload::Containers(inv) => inv.containers.len(),
            Payload::Compose(topology) => topology
                .stacks
                .iter()
                .map(|stack| 1 + stack.services.len())
                .sum(),
        }
    }
}

impl From<HostFacts> for Payload {
    fn from(value: HostFacts) -> Self {
        Payload::HostFacts(value)
    }
}

impl From<ContainerInventory> for Payload {
    fn from(value: ContainerInventory) -> Self {
        Payload::Containers(value)
    }
}

impl From<ComposeTopology> for Payload {
    fn from(value: ComposeTopology) -> Self {
        Payload::Compose(value)
    }
}

/// Facts about a host. `uptime_seconds` is informational and not compared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HostFacts {
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub architecture: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_total_mb: Option<u64>,
    pub docker_version: Option<String>,
    pub compose_version: Option<String>,
    pub addresses: BTreeSet<String>,
    pub uptime_seconds: Option<u64>,
}

/// Runtime state of a container as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RunState {
    Running,
    Stopped,
    Restarting,
    Paused,
    Dead,
    Created,
    #[default]
    Unknown,
}

impl RunState {
    /// Whether a container in this state is serving.
    pub fn is_available(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
            RunState::Restarting => "restarting",
            RunState::Paused => "paused",
            RunState::Dead => "dead",
            RunState::Created => "created",
            RunState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: Option<u16>,
    #[cfg_attr(feature = "serde", serde(default = "PortMapping::default_protocol"))]
    pub protocol: String,
    #[cfg_attr(feature = "serde", serde(default = "PortMapping::default_host_ip"))]
    pub host_ip: String,
}

impl PortMapping {
    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self {
            container_port,
            host_port: Some(host_port),
            protocol: Self::default_protocol(),
            host_ip: Self::default_host_ip(),
        }
    }

    fn default_protocol() -> String {
        "tcp".to_string()
    }

    fn default_host_ip() -> String {
        "0.0.0.0".to_string()
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_port {
            Some(host_port) => write!(
                f,
                "{}:{}->{}/{}",
                self.host_ip, host_port, self.container_port, self.protocol
            ),
            None => write!(f, "{}/{}", self.container_port, self.protocol),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerInventory {
    pub containers: Vec<ContainerRecord>,
}

/// One container. Containers are identified by `name`, which survives
/// re-creation; `id` changes every time the container is recreated and is
/// not compared. `restart_count` is informational.
///
/// `labels` and `environment` may carry credentials; values under sensitive
/// keys are masked by [`crate::redact`] before a snapshot is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_version: Option<String>,
    pub state: RunState,
    pub health: Option<String>,
    pub ports: Vec<PortMapping>,
    /// Docker networks the container is attached to.
    pub networks: BTreeSet<String>,
    pub restart_policy: Option<String>,
    pub memory_limit_mb: Option<u64>,
    pub cpu_limit_millis: Option<u64>,
    pub compose_project: Option<String>,
    pub compose_service: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    pub restart_count: u32,
}

impl ContainerRecord {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        state: RunState,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            image: image.into(),
            state,
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: PortMapping) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.networks.insert(network.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComposeTopology {
    pub stacks: Vec<ComposeStackRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ComposeStackRecord {
    pub name: String,
    pub path: String,
    pub version: Option<String>,
    pub services: Vec<ComposeServiceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ComposeServiceRecord {
    pub name: String,
    pub image: Option<String>,
    pub ports: Vec<PortMapping>,
    pub depends_on: BTreeSet<String>,
    pub networks: BTreeSet<String>,
    pub volumes: BTreeSet<String>,
    pub restart_policy: Option<String>,
}
