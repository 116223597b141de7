//! The capability every collector implements, and the registry the
//! orchestrator resolves collector kinds through.
//!
//! Collectors are black boxes: how they reach a host (SSH, a Docker socket,
//! a local compose file) and how they resolve credentials is their business.
//! The core only hands them an immutable [`Target`] and a per-attempt timeout.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use labscan_model::{CollectorKind, Payload, Target};
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("collector timed out: {0}")]
    Timeout(String),

    #[error("remote command failed: {0}")]
    Command(String),

    #[error("could not parse collector output: {0}")]
    Parse(String),

    #[error("collector does not support this target: {0}")]
    Unsupported(String),
}

impl Retryable for CollectorError {
    /// Bad credentials, malformed output and unsupported targets fail the
    /// same way on every attempt.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CollectorError::Auth(_)
                | CollectorError::Parse(_)
                | CollectorError::Unsupported(_)
        )
    }
}

/// Data returned by one successful collection. Non-empty `warnings` mark the
/// result as `partial`: the payload is usable but incomplete.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutput {
    pub payload: Payload,
    pub warnings: Vec<String>,
}

impl CollectorOutput {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl From<Payload> for CollectorOutput {
    fn from(payload: Payload) -> Self {
        Self::new(payload)
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    fn kind(&self) -> CollectorKind;

    /// Whether this collector can observe `target` at all. Inapplicable
    /// pairs are left out of the work list instead of failing.
    fn applies_to(&self, _target: &Target) -> bool {
        true
    }

    /// Observes one target. Must be safe to repeat: the retry policy calls
    /// it again from scratch after a failure.
    async fn collect(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> Result<CollectorOutput, CollectorError>;
}

/// Maps each collector kind to the implementation that serves it.
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: BTreeMap<CollectorKind, Arc<dyn Collector>>,
}

impl fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("kinds", &self.collectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `collector` under its own kind, returning the one it
    /// replaced.
    pub fn register(
        &mut self,
        collector: Arc<dyn Collector>,
    ) -> Option<Arc<dyn Collector>> {
        self.collectors.insert(collector.kind(), collector)
    }

    pub fn with(mut self, collector: Arc<dyn Collector>) -> Self {
        self.register(collector);
        self
    }

    pub fn get(&self, kind: CollectorKind) -> Option<Arc<dyn Collector>> {
        self.collectors.get(&kind).cloned()
    }

    pub fn contains(&self, kind: CollectorKind) -> bool {
        self.collectors.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = CollectorKind> + '_ {
        self.collectors.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use labscan_model::HostFacts;

    use super::*;

    struct Facts;

    #[async_trait]
    impl Collector for Facts {
        fn kind(&self) -> CollectorKind {
            CollectorKind::HostFacts
        }

        async fn collect(
            &self,
            target: &Target,
            _timeout: Duration,
        ) -> Result<CollectorOutput, CollectorError> {
            Ok(CollectorOutput::new(HostFacts {
                hostname: Some(target.hostname.clone()),
                ..Default::default()
            }))
        }
    }

    #[test]
    fn auth_and_parse_errors_are_not_retried() {
        assert!(CollectorError::Unreachable("no route".into()).is_retryable());
        assert!(CollectorError::Timeout("ssh".into()).is_retryable());
        assert!(CollectorError::Command("exit 1".into()).is_retryable());
        assert!(!CollectorError::Auth("bad key".into()).is_retryable());
        assert!(!CollectorError::Parse("bad json".into()).is_retryable());
        assert!(!CollectorError::Unsupported("windows".into()).is_retryable());
    }

    #[tokio::test]
    async fn registry_resolves_by_kind() {
        let mut registry = CollectorRegistry::new();
        assert!(registry.register(Arc::new(Facts)).is_none());
        assert!(registry.register(Arc::new(Facts)).is_some());
        assert!(registry.contains(CollectorKind::HostFacts));
        assert!(!registry.contains(CollectorKind::Compose));

        let collector = registry.get(CollectorKind::HostFacts).unwrap();
        let output = collector
            .collect(&Target::new("srv1", "srv1.lan"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output.payload.domain(), CollectorKind::HostFacts);
        assert!(output.warnings.is_empty());
    }
}
