//! Masking of credentials that collectors pick up from container labels and
//! environment variables.

use std::collections::BTreeMap;

use crate::payload::{ContainerRecord, Payload};

pub const MASK: &str = "***REDACTED***";

/// Substrings that mark a key as sensitive, matched case-insensitively.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "secret",
    "key",
    "credential",
    "auth",
    "private",
    "cert",
];

/// Environment prefixes used by database images for connection settings.
const SENSITIVE_PREFIXES: &[&str] = &["mysql_", "postgres_", "db_", "database_"];

pub fn is_sensitive_key(key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    let lower = key.to_ascii_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|f| lower.contains(f))
        || SENSITIVE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Mask keeping a length hint, so a rotated secret of a different length
/// still shows up as a change.
pub fn mask_value(value: &str) -> String {
    format!("{MASK} (length: {})", value.chars().count())
}

fn redact_map(map: &mut BTreeMap<String, String>) -> usize {
    let mut masked = 0;
    for (key, value) in map.iter_mut() {
        if is_sensitive_key(key) && !value.is_empty() && !value.starts_with(MASK) {
            *value = mask_value(value);
            masked += 1;
        }
    }
    masked
}

impl ContainerRecord {
    /// Masks sensitive label and environment values in place. Returns how many
    /// values were masked.
    pub fn redact_secrets(&mut self) -> usize {
        redact_map(&mut self.labels) + redact_map(&mut self.environment)
    }
}

impl Payload {
    pub fn redact_secrets(&mut self) -> usize {
        match self {
            Payload::Containers(inventory) => inventory
                .containers
                .iter_mut()
                .map(ContainerRecord::redact_secrets)
                .sum(),
            Payload::HostFacts(_) | Payload::Compose(_) => 0,
        }
    }
}
