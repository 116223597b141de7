//! Decides whether a scan report is worth a notification. Delivery itself
//! belongs to whoever consumes the decision.

use std::collections::BTreeSet;

use labscan_model::Severity;
use serde::{Deserialize, Serialize};

use crate::service::ScanReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    /// Every completed scan, with its counts.
    ScanComplete,
    /// Changes at or above the policy's minimum severity.
    ChangesDetected,
    /// Failed work items, total unreachability, failed comparisons.
    Errors,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertPolicy {
    pub enabled: bool,
    pub triggers: BTreeSet<AlertTrigger>,
    pub min_severity: Severity,
    /// Failed items tolerated before the `errors` trigger fires.
    pub max_failed_items: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            triggers: [AlertTrigger::ChangesDetected, AlertTrigger::Errors].into(),
            min_severity: Severity::Warning,
            max_failed_items: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertPriority {
    Low,
    Default,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertReason {
    ScanComplete {
        work_items: usize,
        containers: usize,
        duration_ms: u64,
    },
    Changes {
        critical: usize,
        warning: usize,
        info: usize,
    },
    FailedItems {
        failed: usize,
        threshold: usize,
    },
    TotalFailure,
    ComparisonFailed(String),
}

impl AlertReason {
    fn priority(&self) -> AlertPriority {
        match self {
            AlertReason::ScanComplete { .. } => AlertPriority::Low,
            AlertReason::Changes { critical, warning, .. } => {
                if *critical > 0 {
                    AlertPriority::Urgent
                } else if *warning > 0 {
                    AlertPriority::High
                } else {
                    AlertPriority::Default
                }
            }
            AlertReason::FailedItems { .. } | AlertReason::ComparisonFailed(_) => {
                AlertPriority::High
            }
            AlertReason::TotalFailure => AlertPriority::Urgent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    Quiet,
    Notify {
        priority: AlertPriority,
        reasons: Vec<AlertReason>,
    },
}

impl AlertDecision {
    pub fn should_notify(&self) -> bool {
        matches!(self, AlertDecision::Notify { .. })
    }
}

impl AlertPolicy {
    fn fires(&self, trigger: AlertTrigger) -> bool {
        self.enabled && self.triggers.contains(&trigger)
    }

    pub fn evaluate(&self, report: &ScanReport) -> AlertDecision {
        let mut reasons = Vec::new();
        let snapshot = &report.snapshot;

        if self.fires(AlertTrigger::ScanComplete) {
            let stats = snapshot.stats();
            reasons.push(AlertReason::ScanComplete {
                work_items: stats.work_items,
                containers: stats.containers,
                duration_ms: stats.duration_ms,
            });
        }

        if self.fires(AlertTrigger::ChangesDetected)
            && let Some(changes) = report.changes()
        {
            let (mut critical, mut warning, mut info) = (0, 0, 0);
            for entry in changes.at_least(self.min_severity) {
                match entry.severity {
                    Severity::Critical => critical += 1,
                    Severity::Warning => warning += 1,
                    Severity::Info => info += 1,
                }
            }
            if critical + warning + info > 0 {
                reasons.push(AlertReason::Changes {
                    critical,
                    warning,
                    info,
                });
            }
        }

        if self.fires(AlertTrigger::Errors) {
            if snapshot.is_total_failure() {
                reasons.push(AlertReason::TotalFailure);
            } else if snapshot.failure_count() > self.max_failed_items {
                reasons.push(AlertReason::FailedItems {
                    failed: snapshot.failure_count(),
                    threshold: self.max_failed_items,
                });
            }
            if let Err(err) = &report.comparison {
                reasons.push(AlertReason::ComparisonFailed(err.to_string()));
            }
        }

        match reasons.iter().map(AlertReason::priority).max() {
            Some(priority) => AlertDecision::Notify { priority, reasons },
            None => AlertDecision::Quiet,
        }
    }
}
