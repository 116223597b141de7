use anyhow::{Context, anyhow};
use labscan_model::{
    ConnectionRef, Criticality, ServerRole, Target, TransportKind,
};
use serde::{Deserialize, Serialize};

/// SSH settings of a target. Only a reference to the key or password is
/// carried into the scan model; collectors resolve it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshConfig {
    pub user: String,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

impl SshConfig {
    fn credentials_ref(&self) -> Option<String> {
        match (&self.key_path, &self.password) {
            (Some(path), _) if !path.is_empty() => Some(format!("key:{path}")),
            (_, Some(password)) if !password.is_empty() => {
                Some("password".to_string())
            }
            _ => None,
        }
    }
}

/// One `[[targets]]` entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub tailscale_ip: Option<String>,
    #[serde(default, alias = "local_ip")]
    pub lan_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
    /// Free-form so legacy spellings such as `utility_server` keep working.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub criticality: Option<String>,
    #[serde(default)]
    pub compose_paths: Vec<String>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            local: false,
            tailscale_ip: None,
            lan_ip: None,
            public_ip: None,
            ssh: None,
            role: None,
            criticality: None,
            compose_paths: Vec::new(),
        }
    }

    pub fn parsed_role(&self) -> anyhow::Result<ServerRole> {
        match self.role.as_deref().map(str::trim) {
            None | Some("") => Ok(ServerRole::default()),
            Some(raw) => raw.parse().map_err(|err| anyhow!("{err}")),
        }
    }

    /// `None` when the target declares no tier.
    pub fn parsed_criticality(&self) -> anyhow::Result<Option<Criticality>> {
        match self.criticality.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|err| anyhow!("{err}")),
        }
    }

    pub fn to_target(&self) -> anyhow::Result<Target> {
        let role = self
            .parsed_role()
            .with_context(|| format!("target `{}`", self.name))?;
        let criticality = self
            .parsed_criticality()
            .with_context(|| format!("target `{}`", self.name))?;

        let mut target = Target::new(self.name.as_str(), self.hostname.as_str());
        target.role = role;
        target.criticality = criticality;
        target.compose_paths = self.compose_paths.clone();

        if self.local {
            target = target.with_address(TransportKind::Local, "localhost");
        }
        for (transport, address) in [
            (TransportKind::Tailscale, &self.tailscale_ip),
            (TransportKind::Lan, &self.lan_ip),
            (TransportKind::Public, &self.public_ip),
        ] {
            if let Some(address) = address.as_deref()
                && !address.trim().is_empty()
            {
                target = target.with_address(transport, address.trim());
            }
        }

        target.connection = ConnectionRef {
            transport: if self.local {
                Some(TransportKind::Local)
            } else {
                None
            },
            user: self.ssh.as_ref().map(|ssh| ssh.user.clone()),
            port: self.ssh.as_ref().map(|ssh| ssh.port),
            credentials_ref: self.ssh.as_ref().and_then(SshConfig::credentials_ref),
        };

        Ok(target)
    }
}
