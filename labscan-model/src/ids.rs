use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::error::ModelError;

/// Configured name of a scan target. Targets are referenced by this id from
/// snapshots and change entries; the target record itself stays with the
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TargetId(String);

impl TargetId {
    pub fn new(name: impl Into<String>) -> Self {
        TargetId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        TargetId::new(value)
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        TargetId(value)
    }
}

impl AsRef<str> for TargetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strongly typed id for snapshots. UUIDv7, so ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SnapshotId(pub Uuid);

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotId {
    pub fn new() -> Self {
        SnapshotId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for SnapshotId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for SnapshotId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SnapshotId)
            .map_err(|err| ModelError::InvalidId(format!("{s}: {err}")))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
