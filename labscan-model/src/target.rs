use std::{fmt, str::FromStr};

use crate::{error::ModelError, ids::TargetId};

/// How much an outage of a target hurts. Ordered so that
/// `NiceToHave < Important < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Criticality {
    NiceToHave,
    /// Also the tier assumed when a target declares none.
    #[default]
    Important,
    Critical,
}

impl Criticality {
    /// Resolves an optional declared tier. Targets without a tier are treated
    /// as `Important` rather than guessed to be critical.
    pub fn resolve(declared: Option<Criticality>) -> Criticality {
        declared.unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::NiceToHave => "nice-to-have",
            Criticality::Important => "important",
            Criticality::Critical => "critical",
        }
    }
}

impl FromStr for Criticality {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "critical" => Ok(Criticality::Critical),
            "important" => Ok(Criticality::Important),
            "nice-to-have" | "nice" => Ok(Criticality::NiceToHave),
            _ => Err(ModelError::InvalidCriticality(s.to_string())),
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network path a target can be reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TransportKind {
    Local,
    Tailscale,
    Lan,
    Public,
}

impl TransportKind {
    /// Order in which addresses are preferred when a target has several.
    pub const PREFERENCE: [TransportKind; 4] = [
        TransportKind::Local,
        TransportKind::Tailscale,
        TransportKind::Lan,
        TransportKind::Public,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Local => "local",
            TransportKind::Tailscale => "tailscale",
            TransportKind::Lan => "lan",
            TransportKind::Public => "public",
        }
    }
}

impl FromStr for TransportKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "localhost" => Ok(TransportKind::Local),
            "tailscale" | "vpn" => Ok(TransportKind::Tailscale),
            "lan" => Ok(TransportKind::Lan),
            "public" | "wan" => Ok(TransportKind::Public),
            _ => Err(ModelError::InvalidTransport(s.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ServerRole {
    Primary,
    Secondary,
    #[default]
    Utility,
    Media,
    PublicFacing,
    Development,
    Backup,
}

impl ServerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRole::Primary => "primary",
            ServerRole::Secondary => "secondary",
            ServerRole::Utility => "utility",
            ServerRole::Media => "media",
            ServerRole::PublicFacing => "public-facing",
            ServerRole::Development => "development",
            ServerRole::Backup => "backup",
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerRole {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = normalized.strip_suffix("-server").unwrap_or(&normalized);
        match normalized {
            "primary" => Ok(ServerRole::Primary),
            "secondary" => Ok(ServerRole::Secondary),
            "utility" => Ok(ServerRole::Utility),
            "media" => Ok(ServerRole::Media),
            "public-facing" => Ok(ServerRole::PublicFacing),
            "development" => Ok(ServerRole::Development),
            "backup" => Ok(ServerRole::Backup),
            _ => Err(ModelError::InvalidRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetAddress {
    pub transport: TransportKind,
    pub address: String,
}

/// Opaque connection descriptor. The core hands it to collectors untouched;
/// only collectors know what a credentials reference resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionRef {
    pub transport: Option<TransportKind>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub credentials_ref: Option<String>,
}

/// A scannable endpoint as declared by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Target {
    pub id: TargetId,
    pub hostname: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub addresses: Vec<TargetAddress>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub connection: ConnectionRef,
    #[cfg_attr(feature = "serde", serde(default))]
    pub role: ServerRole,
    #[cfg_attr(feature = "serde", serde(default))]
    pub criticality: Option<Criticality>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub compose_paths: Vec<String>,
}

impl Target {
    pub fn new(id: impl Into<TargetId>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            addresses: Vec::new(),
            connection: ConnectionRef::default(),
            role: ServerRole::default(),
            criticality: None,
            compose_paths: Vec::new(),
        }
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = Some(criticality);
        self
    }

    pub fn with_address(
        mut self,
        transport: TransportKind,
        address: impl Into<String>,
    ) -> Self {
        self.addresses.push(TargetAddress {
            transport,
            address: address.into(),
        });
        self
    }

    pub fn with_compose_path(mut self, path: impl Into<String>) -> Self {
        self.compose_paths.push(path.into());
        self
    }

    pub fn effective_criticality(&self) -> Criticality {
        Criticality::resolve(self.criticality)
    }

    pub fn has_transport(&self, transport: TransportKind) -> bool {
        self.addresses
            .iter()
            .any(|addr| addr.transport == transport)
    }

    /// Best address to reach the target, following
    /// [`TransportKind::PREFERENCE`]. Falls back to the hostname.
    pub fn primary_address(&self) -> &str {
        TransportKind::PREFERENCE
            .iter()
            .find_map(|kind| {
                self.addresses
                    .iter()
                    .find(|addr| addr.transport == *kind)
            })
            .map(|addr| addr.address.as_str())
            .unwrap_or(&self.hostname)
    }
}
