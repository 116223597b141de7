//! Checks that need the whole configuration in view.

use std::collections::BTreeSet;

use labscan_core::ConfigError;
use labscan_model::CollectorKind;
use thiserror::Error;

use crate::models::LabscanConfig;

/// Problems that make a configuration unusable for scanning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigIssue {
    #[error("no targets configured")]
    NoTargets,

    #[error("duplicate target name `{0}`")]
    DuplicateTarget(String),

    #[error("target `{name}`: {reason}")]
    InvalidTarget { name: String, reason: String },

    #[error("unknown collector `{0}`")]
    UnknownCollector(String),

    #[error("no collectors enabled")]
    NoCollectors,

    #[error("scanning.exclusions: {0}")]
    InvalidExclusion(String),

    #[error("scanning.orchestrator: {0}")]
    Orchestrator(#[from] ConfigError),

    #[error("scanning.schedule_interval_secs must be greater than zero")]
    ZeroInterval,
}

/// Suspicious but usable settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("target `{0}` declares no criticality, treated as important")]
    MissingCriticality(String),

    #[error("exclusion references unknown target `{0}`")]
    UnknownExclusionTarget(String),

    #[error("target `{0}` has no address besides its hostname")]
    HostnameOnly(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigWarning>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns the report into an error listing every issue.
    pub fn into_result(self) -> anyhow::Result<Vec<ConfigWarning>> {
        if self.errors.is_empty() {
            return Ok(self.warnings);
        }
        let listed = self
            .errors
            .iter()
            .map(|issue| format!("  - {issue}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(anyhow::anyhow!("invalid labscan configuration:\n{listed}"))
    }
}

impl LabscanConfig {
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.targets.is_empty() {
            report.errors.push(ConfigIssue::NoTargets);
        }

        let mut seen = BTreeSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                report
                    .errors
                    .push(ConfigIssue::DuplicateTarget(target.name.clone()));
            }
            if let Err(err) = target.to_target() {
                report.errors.push(ConfigIssue::InvalidTarget {
                    name: target.name.clone(),
                    reason: err.root_cause().to_string(),
                });
                continue;
            }
            if target.criticality.is_none() {
                report
                    .warnings
                    .push(ConfigWarning::MissingCriticality(target.name.clone()));
            }
            if !target.local
                && target.tailscale_ip.is_none()
                && target.lan_ip.is_none()
                && target.public_ip.is_none()
            {
                report
                    .warnings
                    .push(ConfigWarning::HostnameOnly(target.name.clone()));
            }
        }

        let mut known = 0;
        for name in &self.scanning.enabled_collectors {
            match name.parse::<CollectorKind>() {
                Ok(_) => known += 1,
                Err(_) => report
                    .errors
                    .push(ConfigIssue::UnknownCollector(name.clone())),
            }
        }
        if known == 0 {
            report.errors.push(ConfigIssue::NoCollectors);
        }

        match self.scanning.orchestrator_config() {
            Ok(orchestrator) => {
                if let Err(err) = orchestrator.validate() {
                    report.errors.push(err.into());
                }
                for exclusion in &orchestrator.exclusions {
                    if !seen.contains(exclusion.target.as_str()) {
                        report.warnings.push(ConfigWarning::UnknownExclusionTarget(
                            exclusion.target.to_string(),
                        ));
                    }
                }
            }
            Err(err) => report
                .errors
                .push(ConfigIssue::InvalidExclusion(err.to_string())),
        }

        if self.scanning.schedule_interval_secs == 0 {
            report.errors.push(ConfigIssue::ZeroInterval);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::targets::TargetConfig;

    fn target(name: &str, tier: &str) -> TargetConfig {
        let mut config = TargetConfig::new(name, format!("{name}.lan"));
        config.criticality = Some(tier.into());
        config.lan_ip = Some("10.0.0.2".into());
        config
    }

    #[test]
    fn default_config_has_no_targets() {
        let report = LabscanConfig::default().validate();
        assert_eq!(report.errors, [ConfigIssue::NoTargets]);
    }

    #[test]
    fn collects_every_issue() {
        let mut config = LabscanConfig::default();
        config.targets = vec![
            target("srv1", "critical"),
            target("srv1", "important"),
            target("pi", "whatever"),
        ];
        config.scanning.enabled_collectors = vec!["docker".into(), "snmp".into()];
        config.scanning.orchestrator.retry.max_attempts = 0;

        let report = config.validate();
        assert!(!report.is_ok());
        assert!(report
            .errors
            .contains(&ConfigIssue::DuplicateTarget("srv1".into())));
        assert!(report.errors.contains(&ConfigIssue::InvalidTarget {
            name: "pi".into(),
            reason: "invalid criticality tier: whatever".into(),
        }));
        assert!(report
            .errors
            .contains(&ConfigIssue::UnknownCollector("snmp".into())));
        assert!(report
            .errors
            .contains(&ConfigIssue::Orchestrator(ConfigError::ZeroAttempts)));

        let err = report.into_result().unwrap_err().to_string();
        assert!(err.contains("duplicate target name `srv1`"));
    }

    #[test]
    fn warnings_do_not_fail_validation() {
        let mut config = LabscanConfig::default();
        config.targets = vec![TargetConfig::new("nas", "nas.lan")];
        let warnings = config.validate().into_result().unwrap();
        assert_eq!(
            warnings,
            [
                ConfigWarning::MissingCriticality("nas".into()),
                ConfigWarning::HostnameOnly("nas".into()),
            ]
        );
    }
}
