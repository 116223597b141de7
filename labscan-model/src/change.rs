//! Change sets derived from comparing two snapshots.

use std::{cmp::Reverse, collections::BTreeMap, fmt, str::FromStr};

use crate::{
    domain::CollectorKind,
    error::ModelError,
    ids::{SnapshotId, TargetId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so that `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(ModelError::InvalidSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected difference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    /// Target id for host facts, `target/entity` for containers and compose.
    pub subject: String,
    pub target: TargetId,
    pub domain: CollectorKind,
    pub severity: Severity,
    #[cfg_attr(feature = "serde", serde(default))]
    pub field_path: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub old_value: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub new_value: Option<String>,
    pub description: String,
}

impl ChangeEntry {
    fn sort_key(&self) -> (Reverse<Severity>, &str, CollectorKind, Option<&str>) {
        (
            Reverse(self.severity),
            self.subject.as_str(),
            self.domain,
            self.field_path.as_deref(),
        )
    }
}

/// Per-severity, per-kind and per-domain counts over a change set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub by_kind: BTreeMap<ChangeKind, usize>,
    pub by_domain: BTreeMap<CollectorKind, usize>,
}

impl ChangeSummary {
    fn from_entries(entries: &[ChangeEntry]) -> Self {
        let mut summary = ChangeSummary {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            match entry.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Warning => summary.warning += 1,
                Severity::Info => summary.info += 1,
            }
            *summary.by_kind.entry(entry.kind).or_default() += 1;
            *summary.by_domain.entry(entry.domain).or_default() += 1;
        }
        summary
    }
}

/// Ordered, severity-classified differences between two snapshots. Entries
/// are sorted by descending severity, then subject, so reports are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeSet {
    from: Option<SnapshotId>,
    to: SnapshotId,
    entries: Vec<ChangeEntry>,
    summary: ChangeSummary,
}

impl ChangeSet {
    /// Orders `entries` and computes the summary over the final list.
    pub fn from_entries(
        from: Option<SnapshotId>,
        to: SnapshotId,
        mut entries: Vec<ChangeEntry>,
    ) -> Self {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let summary = ChangeSummary::from_entries(&entries);
        Self {
            from,
            to,
            entries,
            summary,
        }
    }

    /// Snapshot compared against; `None` for a first-scan baseline.
    pub fn previous_id(&self) -> Option<SnapshotId> {
        self.from
    }

    pub fn current_id(&self) -> SnapshotId {
        self.to
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn summary(&self) -> &ChangeSummary {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_baseline(&self) -> bool {
        self.from.is_none()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.entries.first().map(|entry| entry.severity)
    }

    /// Entries at or above `severity`, in order.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .take_while(move |entry| entry.severity >= severity)
    }
}
