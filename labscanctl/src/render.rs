//! Plain-text views for the terminal.

use std::fmt::Write as _;

use labscan_config::{ConfigSource, LabscanConfig, ValidationReport};
use labscan_model::{
    ChangeEntry, ChangeKind, ChangeSet, Severity, Snapshot, SnapshotMeta, Target,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn validation(
    source: &ConfigSource,
    config: &LabscanConfig,
    report: &ValidationReport,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config: {source}");
    let _ = writeln!(
        out,
        "targets: {}  collectors: {}  store: {}",
        config.targets.len(),
        config.scanning.enabled_collectors.join(", "),
        config.store.path.display()
    );
    for warning in &report.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    for issue in &report.errors {
        let _ = writeln!(out, "error: {issue}");
    }
    if report.is_ok() {
        out.push_str("configuration is valid\n");
    }
    out
}

pub fn targets(targets: &[Target]) -> String {
    let width = targets
        .iter()
        .map(|t| t.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<12}  {:<13}  {:<18}  TRANSPORTS",
        "NAME", "TIER", "ROLE", "ADDRESS"
    );
    for target in targets {
        let transports = target
            .addresses
            .iter()
            .map(|addr| addr.transport.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(
            out,
            "{:<width$}  {:<12}  {:<13}  {:<18}  {}",
            target.id.as_str(),
            target.effective_criticality().as_str(),
            target.role.as_str(),
            target.primary_address(),
            if transports.is_empty() { "-" } else { &transports },
        );
    }
    out
}

pub fn snapshot_list(snapshots: &[SnapshotMeta]) -> String {
    if snapshots.is_empty() {
        return "no snapshots stored\n".to_string();
    }
    let mut out = String::new();
    for meta in snapshots {
        let _ = write!(
            out,
            "{}  {}  items={} failed={}",
            meta.id,
            meta.created_at.format(TIME_FORMAT),
            meta.work_items,
            meta.failed
        );
        if meta.cancelled {
            out.push_str("  (cancelled)");
        }
        out.push('\n');
    }
    out
}

pub fn snapshot(snapshot: &Snapshot) -> String {
    let stats = snapshot.stats();
    let mut out = String::new();
    let _ = writeln!(out, "snapshot {}", snapshot.id());
    let _ = writeln!(
        out,
        "created {} in {} ms{}",
        snapshot.created_at().format(TIME_FORMAT),
        stats.duration_ms,
        if snapshot.is_cancelled() { ", cancelled" } else { "" }
    );
    let _ = writeln!(
        out,
        "{} targets, {} items: {} ok, {} partial, {} failed; {} containers ({} running), {} compose stacks",
        stats.targets,
        stats.work_items,
        stats.ok,
        stats.partial,
        stats.failed,
        stats.containers,
        stats.running_containers,
        stats.compose_stacks
    );
    for result in snapshot.results() {
        let _ = write!(
            out,
            "  {:<32} {:<8} attempts={} {}ms",
            result.key().to_string(),
            result.status().as_str(),
            result.attempts(),
            result.elapsed_ms()
        );
        if let Some(cause) = result.cause() {
            let _ = write!(out, " [{cause}]");
        }
        if let Some(error) = result.error() {
            let _ = write!(out, " {error}");
        }
        out.push('\n');
    }
    out
}

fn describe(entry: &ChangeEntry) -> String {
    let mut line = format!(
        "[{:<8}] {} {}",
        entry.severity.as_str().to_ascii_uppercase(),
        entry.subject,
        entry.description
    );
    if entry.kind == ChangeKind::Modified {
        let _ = write!(
            line,
            " ({} -> {})",
            entry.old_value.as_deref().unwrap_or("-"),
            entry.new_value.as_deref().unwrap_or("-")
        );
    }
    line
}

pub fn changes(changes: &ChangeSet, min_severity: Severity) -> String {
    let summary = changes.summary();
    let mut out = String::new();
    match changes.previous_id() {
        Some(from) => {
            let _ = writeln!(out, "changes {from} -> {}", changes.current_id());
        }
        None => {
            let _ = writeln!(out, "baseline {}", changes.current_id());
        }
    }
    let _ = writeln!(
        out,
        "{} changes: {} critical, {} warning, {} info",
        summary.total, summary.critical, summary.warning, summary.info
    );

    let mut shown = 0;
    for entry in changes.at_least(min_severity) {
        let _ = writeln!(out, "  {}", describe(entry));
        shown += 1;
    }
    if shown < changes.len() {
        let _ = writeln!(
            out,
            "  ({} below {min_severity} hidden)",
            changes.len() - shown
        );
    }
    out
}
