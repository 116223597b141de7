//! Configuration loading for labscan.
//!
//! A deployment is described by one TOML (or JSON) document listing the
//! scan targets, the enabled collectors with their orchestration knobs, the
//! snapshot store location and the alert policy. `${VAR}` references are
//! expanded from the environment before the document is parsed.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{CONFIG_JSON_ENV, CONFIG_PATH_ENV, expand_env_vars};
pub use models::scanning::{ExclusionConfig, ScanningConfig, StoreConfig};
pub use models::targets::{SshConfig, TargetConfig};
pub use models::{ConfigSource, LabscanConfig};
pub use validation::{ConfigIssue, ConfigWarning, ValidationReport};
