use anyhow::{Context, Result};
use labscan_core::{SnapshotStore, StoreError};

use crate::{cli::SnapshotsAction, render};

pub async fn run(store: &dyn SnapshotStore, action: SnapshotsAction) -> Result<()> {
    match action {
        SnapshotsAction::List { json } => {
            let snapshots = store.list().await.context("failed to list snapshots")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else {
                print!("{}", render::snapshot_list(&snapshots));
            }
        }
        SnapshotsAction::Show { id, json } => {
            let snapshot = store.get(id).await?.ok_or(StoreError::NotFound(id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
            } else {
                print!("{}", render::snapshot(&snapshot));
            }
        }
    }
    Ok(())
}
