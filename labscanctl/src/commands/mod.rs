mod config;
mod diff;
mod snapshots;

use std::path::{Path, PathBuf};

use anyhow::Result;
use labscan_config::LabscanConfig;
use labscan_core::JsonDirSnapshotStore;
use tracing::debug;

use crate::cli::{Cli, Command};

pub async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        store,
        command,
    } = cli;

    match command {
        Command::Validate => config::validate(config.as_deref()),
        Command::Targets => config::targets(config.as_deref()),
        Command::Snapshots { action } => {
            let store = open_store(config.as_deref(), store)?;
            snapshots::run(&store, action).await
        }
        Command::Diff(args) => {
            let store = open_store(config.as_deref(), store)?;
            diff::run(&store, args).await
        }
    }
}

fn open_store(
    config: Option<&Path>,
    root: Option<PathBuf>,
) -> Result<JsonDirSnapshotStore> {
    let root = match root {
        Some(root) => root,
        None => LabscanConfig::load(config)?.0.store.path,
    };
    debug!(root = %root.display(), "opening snapshot store");
    Ok(JsonDirSnapshotStore::new(root))
}
