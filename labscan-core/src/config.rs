use std::time::Duration;

use labscan_model::{CollectorKind, TargetId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Knobs that tune a scan cycle.
///
/// All fields carry defaults so a deployment can override only what it
/// needs, e.g. `max_in_flight` for a fleet of slow SSH endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Work items allowed to run at the same time across all targets.
    pub max_in_flight: usize,
    /// Overall time limit for one work item, retries and backoff included.
    pub item_deadline_ms: u64,
    /// Retry/backoff policy wrapped around every collector call.
    pub retry: RetryConfig,
    /// (target, collector) pairs that are never attempted.
    pub exclusions: Vec<Exclusion>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            item_deadline_ms: 300_000,
            retry: RetryConfig::default(),
            exclusions: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.item_deadline_ms == 0 {
            return Err(ConfigError::ZeroDuration("item_deadline_ms"));
        }
        self.retry.validate()
    }

    pub fn item_deadline(&self) -> Duration {
        Duration::from_millis(self.item_deadline_ms)
    }

    pub fn is_excluded(&self, target: &TargetId, collector: CollectorKind) -> bool {
        self.exclusions
            .iter()
            .any(|ex| &ex.target == target && ex.collector == collector)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    pub backoff_max_ms: u64,
    /// Upper fraction by which a backoff delay is randomly lengthened. `0.0`
    /// disables jitter.
    pub jitter_ratio: f64,
    /// Timeout applied to every single attempt.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_multiplier: 2.0,
            backoff_max_ms: 30_000,
            jitter_ratio: 0.1,
            attempt_timeout_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.backoff_multiplier));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::BackoffCeiling {
                base_ms: self.backoff_base_ms,
                max_ms: self.backoff_max_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::InvalidJitter(self.jitter_ratio));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("attempt_timeout_ms"));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// A (target, collector) combination that is skipped entirely, e.g. the
/// compose collector on a host that only runs bare containers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exclusion {
    pub target: TargetId,
    pub collector: CollectorKind,
}
