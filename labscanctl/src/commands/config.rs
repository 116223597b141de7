use std::path::Path;

use anyhow::{Result, bail};
use labscan_config::LabscanConfig;
use tracing::info;

use crate::render;

pub fn validate(path: Option<&Path>) -> Result<()> {
    let (config, source) = LabscanConfig::load(path)?;
    info!(%source, "configuration loaded");
    let report = config.validate();
    print!("{}", render::validation(&source, &config, &report));
    if !report.is_ok() {
        bail!("configuration has {} error(s)", report.errors.len());
    }
    Ok(())
}

pub fn targets(path: Option<&Path>) -> Result<()> {
    let (config, _) = LabscanConfig::load(path)?;
    let targets = config.scan_targets()?;
    print!("{}", render::targets(&targets));
    Ok(())
}
