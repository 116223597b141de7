use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use labscan_model::{Severity, SnapshotId};

#[derive(Parser, Debug)]
#[command(
    name = "labscanctl",
    version,
    about = "Inspect labscan configuration and snapshot history"
)]
pub struct Cli {
    /// Config file; without it LABSCAN_CONFIG_PATH, LABSCAN_CONFIG_JSON and
    /// ./labscan.toml are tried in that order
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot directory, overrides `store.path` from the config
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration
    Validate,
    /// List configured targets with tier and transports
    Targets,
    /// Inspect stored snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotsAction,
    },
    /// Compare two stored snapshots (default: latest against its previous)
    Diff(DiffArgs),
}

#[derive(Subcommand, Debug)]
pub enum SnapshotsAction {
    /// List stored snapshots, oldest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show every work item of one snapshot
    Show {
        id: SnapshotId,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Older snapshot (default: the one stored before --to)
    #[arg(long)]
    pub from: Option<SnapshotId>,
    /// Newer snapshot (default: the latest)
    #[arg(long)]
    pub to: Option<SnapshotId>,
    /// Print the change set as JSON
    #[arg(long)]
    pub json: bool,
    /// Hide changes below this severity (info, warning, critical)
    #[arg(long, default_value_t = Severity::Info)]
    pub min_severity: Severity,
}
