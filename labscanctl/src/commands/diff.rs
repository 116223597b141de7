use std::sync::Arc;

use anyhow::{Result, bail};
use labscan_core::{SnapshotStore, StoreError, diff};
use labscan_model::{ChangeSet, Severity, Snapshot, SnapshotId};

use crate::{cli::DiffArgs, render};

pub async fn run(store: &dyn SnapshotStore, args: DiffArgs) -> Result<()> {
    let (previous, current) = select(store, args.from, args.to).await?;
    let changes = diff(previous.as_deref(), &current)?;

    if args.json {
        let changes = filtered(changes, args.min_severity);
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        print!("{}", render::changes(&changes, args.min_severity));
    }
    Ok(())
}

/// Resolves the pair to compare. `to` defaults to the latest snapshot,
/// `from` to the one stored before `to` (none for the first snapshot).
pub async fn select(
    store: &dyn SnapshotStore,
    from: Option<SnapshotId>,
    to: Option<SnapshotId>,
) -> Result<(Option<Arc<Snapshot>>, Arc<Snapshot>)> {
    let current = match to {
        Some(id) => store.get(id).await?.ok_or(StoreError::NotFound(id))?,
        None => match store.latest().await? {
            Some(latest) => latest,
            None => bail!("no snapshots stored yet"),
        },
    };
    let previous = match from {
        Some(id) => Some(store.get(id).await?.ok_or(StoreError::NotFound(id))?),
        None => store.previous(current.id()).await?,
    };
    Ok((previous, current))
}

fn filtered(changes: ChangeSet, min_severity: Severity) -> ChangeSet {
    if min_severity == Severity::Info {
        return changes;
    }
    let entries = changes.at_least(min_severity).cloned().collect();
    ChangeSet::from_entries(changes.previous_id(), changes.current_id(), entries)
}
