pub mod scanning;
pub mod targets;

use std::{fmt, path::PathBuf};

use anyhow::Context;
use labscan_core::AlertPolicy;
use labscan_model::Target;
use serde::{Deserialize, Serialize};

use scanning::{ScanningConfig, StoreConfig};
use targets::TargetConfig;

/// Full deployment configuration of a labscan installation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabscanConfig {
    pub targets: Vec<TargetConfig>,
    pub scanning: ScanningConfig,
    pub store: StoreConfig,
    pub alerts: AlertPolicy,
}

/// Where the active configuration came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("built-in defaults"),
            ConfigSource::EnvPath(path) => {
                write!(f, "{} (LABSCAN_CONFIG_PATH)", path.display())
            }
            ConfigSource::EnvInline => f.write_str("LABSCAN_CONFIG_JSON"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl LabscanConfig {
    /// Scan targets in configured order.
    pub fn scan_targets(&self) -> anyhow::Result<Vec<Target>> {
        self.targets
            .iter()
            .map(TargetConfig::to_target)
            .collect::<anyhow::Result<Vec<_>>>()
            .context("invalid target configuration")
    }

    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|target| target.name == name)
    }
}
