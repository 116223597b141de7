use std::{path::PathBuf, time::Duration};

use anyhow::anyhow;
use labscan_core::{Exclusion, OrchestratorConfig};
use labscan_model::CollectorKind;
use serde::{Deserialize, Serialize};

fn default_collectors() -> Vec<String> {
    CollectorKind::ALL
        .iter()
        .map(|kind| kind.as_str().to_string())
        .collect()
}

/// `[scanning]` section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanningConfig {
    /// Collector names; legacy names like `docker` or `server_info` are
    /// accepted.
    pub enabled_collectors: Vec<String>,
    pub orchestrator: OrchestratorConfig,
    /// Skipped (target, collector) pairs, collector given by name.
    pub exclusions: Vec<ExclusionConfig>,
    pub schedule_interval_secs: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            enabled_collectors: default_collectors(),
            orchestrator: OrchestratorConfig::default(),
            exclusions: Vec::new(),
            // Daily, like the nightly cron the tool grew up with.
            schedule_interval_secs: 86_400,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExclusionConfig {
    pub target: String,
    pub collector: String,
}

impl ScanningConfig {
    /// Enabled collectors in configured order, duplicates dropped.
    pub fn collectors(&self) -> anyhow::Result<Vec<CollectorKind>> {
        let mut kinds = Vec::with_capacity(self.enabled_collectors.len());
        for name in &self.enabled_collectors {
            let kind: CollectorKind =
                name.parse().map_err(|err| anyhow!("{err}"))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Orchestrator knobs with the section-level exclusions merged in.
    pub fn orchestrator_config(&self) -> anyhow::Result<OrchestratorConfig> {
        let mut config = self.orchestrator.clone();
        for exclusion in &self.exclusions {
            let collector: CollectorKind = exclusion
                .collector
                .parse()
                .map_err(|err| anyhow!("exclusion for `{}`: {err}", exclusion.target))?;
            let exclusion = Exclusion {
                target: exclusion.target.as_str().into(),
                collector,
            };
            if !config.exclusions.contains(&exclusion) {
                config.exclusions.push(exclusion);
            }
        }
        Ok(config)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }
}

/// `[store]` section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON file per snapshot.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/snapshots"),
        }
    }
}
