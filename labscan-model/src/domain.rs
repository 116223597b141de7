use std::{fmt, str::FromStr};

use crate::{error::ModelError, ids::TargetId};

/// The observation domains a collector can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CollectorKind {
    /// OS, kernel, hardware and runtime versions of a host.
    HostFacts,
    /// Containers known to the host's container engine.
    Containers,
    /// Compose projects found on the host.
    Compose,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 3] = [
        CollectorKind::HostFacts,
        CollectorKind::Containers,
        CollectorKind::Compose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::HostFacts => "host-facts",
            CollectorKind::Containers => "containers",
            CollectorKind::Compose => "compose",
        }
    }
}

impl FromStr for CollectorKind {
    type Err = ModelError;

    /// Accepts the canonical names plus the legacy scanner names used by older
    /// configuration files (`server_info`, `docker`, `compose_files`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "host-facts" | "server-info" | "host" => Ok(CollectorKind::HostFacts),
            "containers" | "docker" | "container-inventory" => {
                Ok(CollectorKind::Containers)
            }
            "compose" | "compose-files" | "compose-topology" => {
                Ok(CollectorKind::Compose)
            }
            _ => Err(ModelError::UnknownCollector(s.to_string())),
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (target, collector) pair of a scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkItemKey {
    pub target: TargetId,
    pub collector: CollectorKind,
}

impl WorkItemKey {
    pub fn new(target: TargetId, collector: CollectorKind) -> Self {
        Self { target, collector }
    }
}

impl fmt::Display for WorkItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target, self.collector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_scanner_names_map_to_kinds() {
        assert_eq!("server_info".parse(), Ok(CollectorKind::HostFacts));
        assert_eq!("docker".parse(), Ok(CollectorKind::Containers));
        assert_eq!("compose_files".parse(), Ok(CollectorKind::Compose));
        assert_eq!("Host-Facts".parse(), Ok(CollectorKind::HostFacts));
    }

    #[test]
    fn unknown_collector_is_rejected() {
        assert_eq!(
            "snmp".parse::<CollectorKind>(),
            Err(ModelError::UnknownCollector("snmp".into()))
        );
    }

    #[test]
    fn work_item_key_display() {
        let key = WorkItemKey::new("srv1".into(), CollectorKind::Containers);
        assert_eq!(key.to_string(), "srv1/containers");
    }
}
