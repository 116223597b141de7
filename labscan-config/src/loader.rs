//! Locating, expanding and parsing the configuration file.

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, anyhow};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::models::{ConfigSource, LabscanConfig};

pub const CONFIG_PATH_ENV: &str = "LABSCAN_CONFIG_PATH";
pub const CONFIG_JSON_ENV: &str = "LABSCAN_CONFIG_JSON";

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("env reference regex should compile")
});

/// Replaces every `${VAR}` with the value of `VAR`. Unset variables expand
/// to an empty string.
pub fn expand_env_vars(raw: &str) -> String {
    expand_with(raw, |name| env::var(name).ok())
}

/// [`expand_env_vars`] with a caller supplied lookup.
pub fn expand_with<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_REFERENCE
        .replace_all(raw, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            lookup(name).unwrap_or_else(|| {
                warn!(variable = name, "config references unset variable");
                String::new()
            })
        })
        .into_owned()
}

/// Syntax of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Toml,
    Json,
    /// No telling extension: TOML is tried before JSON.
    Either,
}

impl Syntax {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Syntax::Json,
            Some("toml") | Some("tml") => Syntax::Toml,
            _ => Syntax::Either,
        }
    }
}

/// Expands `${VAR}` references in `raw`, then deserializes it. `origin`
/// names the document in error messages.
fn parse_document(
    raw: &str,
    syntax: Syntax,
    origin: &str,
) -> anyhow::Result<LabscanConfig> {
    let expanded = expand_env_vars(raw);
    match syntax {
        Syntax::Toml => toml::from_str(&expanded)
            .map_err(|err| anyhow!("invalid labscan config {origin}: {err}")),
        Syntax::Json => serde_json::from_str(&expanded)
            .map_err(|err| anyhow!("invalid labscan config {origin}: {err}")),
        Syntax::Either => toml::from_str(&expanded).or_else(|toml_err| {
            serde_json::from_str(&expanded).map_err(|json_err| {
                anyhow!(
                    "failed to parse labscan config {origin}: toml error: {toml_err}; json error: {json_err}"
                )
            })
        }),
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl LabscanConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$LABSCAN_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$LABSCAN_CONFIG_JSON` (inline JSON),
    /// 3) the first existing default candidate file,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        let source = match env_value(CONFIG_PATH_ENV) {
            Some(path) => ConfigSource::EnvPath(PathBuf::from(path)),
            None => match env_value(CONFIG_JSON_ENV) {
                Some(raw) => {
                    let config = parse_document(&raw, Syntax::Json, CONFIG_JSON_ENV)?;
                    return Ok((config, ConfigSource::EnvInline));
                }
                None => Self::find_default_file()
                    .map(ConfigSource::File)
                    .unwrap_or(ConfigSource::Default),
            },
        };

        let config = match &source {
            ConfigSource::EnvPath(path) | ConfigSource::File(path) => {
                Self::load_from_file(path)?
            }
            _ => {
                debug!("no labscan config found, using defaults");
                Self::default()
            }
        };
        Ok((config, source))
    }

    /// Loads `path` when given, otherwise falls back to [`Self::load_from_env`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<(Self, ConfigSource)> {
        match path {
            Some(path) => Ok((
                Self::load_from_file(path)?,
                ConfigSource::File(path.to_path_buf()),
            )),
            None => Self::load_from_env(),
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| {
            format!("failed to read labscan config from {}", path.display())
        })?;
        debug!(path = %path.display(), "loading labscan config");
        parse_document(&raw, Syntax::of(path), &path.display().to_string())
    }

    /// Parses a document of unknown syntax, TOML first.
    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        parse_document(contents, Syntax::Either, origin)
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "labscan.toml",
            "labscan.json",
            "config/labscan.toml",
            "config/labscan.json",
        ];

        CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}
