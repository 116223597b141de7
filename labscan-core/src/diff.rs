//! Change detection between two snapshots.
//!
//! Payloads are flattened into keyed entities (one host per target, one
//! container per name, one compose stack per compose file path, one compose
//! service per file path and service name), and entities are compared field
//! by field. Each field belongs to a class that drives its severity.

use std::collections::{BTreeMap, BTreeSet};

use labscan_model::{
    ChangeEntry, ChangeKind, ChangeSet, CollectorKind, ContainerRecord,
    Criticality, HostFacts, PartialResult, Payload, PortMapping, Severity,
    Snapshot, TargetId,
};
use tracing::{debug, warn};

use crate::error::DiffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    /// Whether the entity is serving: running state, health.
    Availability,
    /// How the entity is reached: ports, hostnames, addresses.
    Exposure,
    /// Versions, images and resource settings.
    Descriptive,
}

impl FieldClass {
    fn severity(self, tier: Criticality) -> Severity {
        match self {
            FieldClass::Availability => escalated(tier),
            FieldClass::Exposure => Severity::Warning,
            FieldClass::Descriptive => Severity::Info,
        }
    }
}

/// Critical for critical-tier targets, warning for everything else.
fn escalated(tier: Criticality) -> Severity {
    if tier == Criticality::Critical {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

#[derive(Debug)]
struct Field {
    path: &'static str,
    class: FieldClass,
    value: Option<String>,
}

#[derive(Debug)]
struct Entity {
    label: &'static str,
    /// Identity used to pair entities across snapshots.
    key: String,
    /// What reports call the entity.
    name: String,
    fields: Vec<Field>,
}

fn field(path: &'static str, class: FieldClass, value: Option<String>) -> Field {
    Field { path, class, value }
}

fn text(path: &'static str, class: FieldClass, value: &Option<String>) -> Field {
    field(path, class, value.clone())
}

fn number<N: ToString>(path: &'static str, value: Option<N>) -> Field {
    field(path, FieldClass::Descriptive, value.map(|n| n.to_string()))
}

/// Order-insensitive rendering of a collection; empty collections render as
/// absent.
fn list<T: ToString>(
    path: &'static str,
    class: FieldClass,
    items: impl IntoIterator<Item = T>,
) -> Field {
    let mut rendered: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    rendered.sort();
    let value = (!rendered.is_empty()).then(|| rendered.join(", "));
    field(path, class, value)
}

fn ports(path: &'static str, ports: &[PortMapping]) -> Field {
    list(path, FieldClass::Exposure, ports)
}

fn pairs(path: &'static str, map: &BTreeMap<String, String>) -> Field {
    list(
        path,
        FieldClass::Descriptive,
        map.iter().map(|(k, v)| format!("{k}={v}")),
    )
}

fn host_entity(target: &TargetId, facts: &HostFacts) -> Entity {
    use FieldClass::*;
    Entity {
        label: "host",
        key: target.to_string(),
        name: target.to_string(),
        fields: vec![
            text("hostname", Exposure, &facts.hostname),
            list("addresses", Exposure, &facts.addresses),
            text("os_name", Descriptive, &facts.os_name),
            text("os_version", Descriptive, &facts.os_version),
            text("kernel_version", Descriptive, &facts.kernel_version),
            text("architecture", Descriptive, &facts.architecture),
            text("cpu_model", Descriptive, &facts.cpu_model),
            number("cpu_cores", facts.cpu_cores),
            number("memory_total_mb", facts.memory_total_mb),
            text("docker_version", Descriptive, &facts.docker_version),
            text("compose_version", Descriptive, &facts.compose_version),
        ],
    }
}

fn container_entity(container: &ContainerRecord) -> Entity {
    use FieldClass::*;
    Entity {
        label: "container",
        key: container.name.clone(),
        name: container.name.clone(),
        fields: vec![
            field("state", Availability, Some(container.state.to_string())),
            text("health", Availability, &container.health),
            ports("ports", &container.ports),
            list("networks", Exposure, &container.networks),
            field("image", Descriptive, Some(container.image.clone())),
            text("image_version", Descriptive, &container.image_version),
            text("restart_policy", Descriptive, &container.restart_policy),
            number("memory_limit_mb", container.memory_limit_mb),
            number("cpu_limit_millis", container.cpu_limit_millis),
            text("compose_project", Descriptive, &container.compose_project),
            text("compose_service", Descriptive, &container.compose_service),
            pairs("labels", &container.labels),
            pairs("environment", &container.environment),
        ],
    }
}

fn entities(target: &TargetId, payload: &Payload) -> Vec<Entity> {
    use FieldClass::*;
    match payload {
        Payload::HostFacts(facts) => vec![host_entity(target, facts)],
        Payload::Containers(inventory) => {
            inventory.containers.iter().map(container_entity).collect()
        }
        Payload::Compose(topology) => {
            let mut name_uses: BTreeMap<&str, usize> = BTreeMap::new();
            for stack in &topology.stacks {
                *name_uses.entry(stack.name.as_str()).or_default() += 1;
            }

            let mut out = Vec::new();
            for stack in &topology.stacks {
                // Stack names come from the directory holding the compose
                // file and can repeat on one host.
                let stack_name = if name_uses[stack.name.as_str()] > 1 {
                    format!("{}@{}", stack.name, stack.path)
                } else {
                    stack.name.clone()
                };
                out.push(Entity {
                    label: "compose stack",
                    key: stack.path.clone(),
                    name: stack_name.clone(),
                    fields: vec![text("version", Descriptive, &stack.version)],
                });
                for service in &stack.services {
                    out.push(Entity {
                        label: "compose service",
                        key: format!("{}#{}", stack.path, service.name),
                        name: format!("{stack_name}/{}", service.name),
                        fields: vec![
                            ports("ports", &service.ports),
                            text("image", Descriptive, &service.image),
                            list("depends_on", Descriptive, &service.depends_on),
                            list("networks", Descriptive, &service.networks),
                            list("volumes", Descriptive, &service.volumes),
                            text("restart_policy", Descriptive, &service.restart_policy),
                        ],
                    });
                }
            }
            out
        }
    }
}

fn subject(target: &TargetId, domain: CollectorKind, name: &str) -> String {
    match domain {
        CollectorKind::HostFacts => target.to_string(),
        _ => format!("{target}/{name}"),
    }
}

/// Indexes entities by key. A key seen twice in one payload is kept apart
/// with an occurrence suffix instead of replacing the earlier entity.
fn keyed(target: &TargetId, entities: Vec<Entity>) -> BTreeMap<String, Entity> {
    let mut out = BTreeMap::new();
    for mut entity in entities {
        if out.contains_key(&entity.key) {
            let base = entity.key.clone();
            let mut n = 2;
            while out.contains_key(&format!("{base}#{n}")) {
                n += 1;
            }
            warn!(
                target: "scan::diff",
                %target,
                entity = entity.label,
                key = %base,
                occurrence = n,
                "duplicate entity key in payload"
            );
            entity.key = format!("{base}#{n}");
            entity.name = format!("{}#{n}", entity.name);
        }
        out.insert(entity.key.clone(), entity);
    }
    out
}

/// Collects entries for one snapshot pair.
struct Detector {
    entries: Vec<ChangeEntry>,
}

impl Detector {
    fn entity_entry(
        &mut self,
        kind: ChangeKind,
        severity: Severity,
        result: &PartialResult,
        entity: &Entity,
    ) {
        self.entries.push(ChangeEntry {
            kind,
            subject: subject(result.target(), result.domain(), &entity.name),
            target: result.target().clone(),
            domain: result.domain(),
            severity,
            field_path: None,
            old_value: None,
            new_value: None,
            description: format!("{} {kind}", entity.label),
        });
    }

    fn all_added(&mut self, result: &PartialResult, payload: &Payload) {
        let target = result.target();
        for entity in keyed(target, entities(target, payload)).values() {
            self.entity_entry(ChangeKind::Added, Severity::Info, result, entity);
        }
    }

    fn all_removed(&mut self, result: &PartialResult, payload: &Payload) {
        let severity = escalated(result.criticality());
        let target = result.target();
        for entity in keyed(target, entities(target, payload)).values() {
            self.entity_entry(ChangeKind::Removed, severity, result, entity);
        }
    }

    fn reachability(&mut self, previous: &PartialResult, current: &PartialResult) {
        let (severity, description, old, new) = if current.is_failed() {
            (
                escalated(current.criticality()),
                "became unreachable",
                previous.status().to_string(),
                match current.error() {
                    Some(err) => format!("failed: {err}"),
                    None => current.status().to_string(),
                },
            )
        } else {
            (
                Severity::Info,
                "became reachable again",
                previous.status().to_string(),
                current.status().to_string(),
            )
        };

        self.entries.push(ChangeEntry {
            kind: ChangeKind::Modified,
            subject: current.target().to_string(),
            target: current.target().clone(),
            domain: current.domain(),
            severity,
            field_path: Some("status".to_string()),
            old_value: Some(old),
            new_value: Some(new),
            description: description.to_string(),
        });
    }

    fn compare(
        &mut self,
        previous: &PartialResult,
        prev_payload: &Payload,
        current: &PartialResult,
        cur_payload: &Payload,
    ) {
        let prev = keyed(
            previous.target(),
            entities(previous.target(), prev_payload),
        );
        let cur = keyed(current.target(), entities(current.target(), cur_payload));

        for (key, entity) in &cur {
            match prev.get(key) {
                None => self.entity_entry(ChangeKind::Added, Severity::Info, current, entity),
                Some(before) => self.compare_fields(current, before, entity),
            }
        }

        let removed_severity = escalated(previous.criticality());
        for (key, entity) in &prev {
            if !cur.contains_key(key) {
                self.entity_entry(ChangeKind::Removed, removed_severity, previous, entity);
            }
        }
    }

    fn compare_fields(&mut self, result: &PartialResult, before: &Entity, after: &Entity) {
        for new in &after.fields {
            let old = before
                .fields
                .iter()
                .find(|f| f.path == new.path)
                .and_then(|f| f.value.as_ref());
            if old == new.value.as_ref() {
                continue;
            }

            self.entries.push(ChangeEntry {
                kind: ChangeKind::Modified,
                subject: subject(result.target(), result.domain(), &after.name),
                target: result.target().clone(),
                domain: result.domain(),
                severity: new.class.severity(result.criticality()),
                field_path: Some(new.path.to_string()),
                old_value: old.cloned(),
                new_value: new.value.clone(),
                description: format!("{} changed", new.path),
            });
        }
    }
}

type PairKey = (TargetId, CollectorKind);

fn index(snapshot: &Snapshot) -> BTreeMap<PairKey, &PartialResult> {
    snapshot
        .results()
        .iter()
        .map(|r| ((r.target().clone(), r.domain()), r))
        .collect()
}

/// Compares `current` against `previous`.
///
/// Without a previous snapshot every entity of every `ok` result is reported
/// as `added` with severity `info`. Comparing a snapshot with itself yields an
/// empty change set.
pub fn diff(
    previous: Option<&Snapshot>,
    current: &Snapshot,
) -> Result<ChangeSet, DiffError> {
    let mut detector = Detector {
        entries: Vec::new(),
    };

    let Some(previous) = previous else {
        for result in current.results().iter().filter(|r| r.is_ok()) {
            if let Some(payload) = result.payload() {
                detector.all_added(result, payload);
            }
        }
        let changes = ChangeSet::from_entries(None, current.id(), detector.entries);
        debug!(
            target: "scan::diff",
            to = %current.id(),
            entries = changes.len(),
            "baseline change set"
        );
        return Ok(changes);
    };

    if previous.schema_version() != current.schema_version() {
        return Err(DiffError::IncompatibleSchema {
            previous: previous.schema_version(),
            current: current.schema_version(),
        });
    }
    if previous.created_at() > current.created_at() {
        return Err(DiffError::OutOfOrder {
            previous: previous.id(),
            current: current.id(),
        });
    }

    let before = index(previous);
    let after = index(current);
    let pairs: BTreeSet<&PairKey> = before.keys().chain(after.keys()).collect();

    for pair in pairs {
        match (before.get(pair).copied(), after.get(pair).copied()) {
            (None, Some(cur)) => {
                if let Some(payload) = cur.payload() {
                    detector.all_added(cur, payload);
                }
            }
            (Some(prev), None) => {
                if let Some(payload) = prev.payload() {
                    detector.all_removed(prev, payload);
                }
            }
            (Some(prev), Some(cur)) => match (prev.payload(), cur.payload()) {
                (Some(old), Some(new)) => detector.compare(prev, old, cur, new),
                (Some(_), None) | (None, Some(_)) => detector.reachability(prev, cur),
                (None, None) => {}
            },
            (None, None) => {}
        }
    }

    let changes =
        ChangeSet::from_entries(Some(previous.id()), current.id(), detector.entries);
    debug!(
        target: "scan::diff",
        from = %previous.id(),
        to = %current.id(),
        entries = changes.len(),
        critical = changes.summary().critical,
        warning = changes.summary().warning,
        "change set computed"
    );
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use labscan_model::{
        ComposeServiceRecord, ComposeStackRecord, ComposeTopology,
        ContainerInventory, FailureCause, RunState, WorkItemKey,
    };

    use super::*;

    fn containers(
        target: &str,
        tier: Criticality,
        records: Vec<ContainerRecord>,
    ) -> PartialResult {
        PartialResult::ok(
            target.into(),
            tier,
            ContainerInventory {
                containers: records,
            }
            .into(),
            1,
            10,
        )
    }

    fn snapshot(results: Vec<PartialResult>) -> Snapshot {
        Snapshot::assemble(Utc::now(), results)
    }

    fn web() -> ContainerRecord {
        ContainerRecord::new("web", "nginx:1.27", RunState::Running)
            .with_port(PortMapping::tcp(8080, 80))
    }

    #[test]
    fn container_state_change_escalates_for_critical_targets() {
        let mut stopped = web();
        stopped.state = RunState::Stopped;

        for (tier, expected) in [
            (Criticality::Critical, Severity::Critical),
            (Criticality::Important, Severity::Warning),
            (Criticality::NiceToHave, Severity::Warning),
        ] {
            let s1 = snapshot(vec![containers("srv1", tier, vec![web()])]);
            let s2 = snapshot(vec![containers("srv1", tier, vec![stopped.clone()])]);
            let changes = diff(Some(&s1), &s2).unwrap();
            assert_eq!(changes.len(), 1);
            let entry = &changes.entries()[0];
            assert_eq!(entry.field_path.as_deref(), Some("state"));
            assert_eq!(entry.old_value.as_deref(), Some("running"));
            assert_eq!(entry.new_value.as_deref(), Some("stopped"));
            assert_eq!(entry.severity, expected);
            assert_eq!(entry.subject, "srv1/web");
        }
    }

    #[test]
    fn version_changes_are_info_and_volatile_fields_ignored() {
        let mut upgraded = web();
        upgraded.image = "nginx:1.28".into();
        upgraded.id = "f00d".into();
        upgraded.restart_count = 7;

        let s1 = snapshot(vec![containers("srv1", Criticality::Critical, vec![web()])]);
        let s2 = snapshot(vec![containers("srv1", Criticality::Critical, vec![upgraded])]);
        let changes = diff(Some(&s1), &s2).unwrap();

        assert_eq!(changes.len(), 1);
        let entry = &changes.entries()[0];
        assert_eq!(entry.field_path.as_deref(), Some("image"));
        assert_eq!(entry.severity, Severity::Info);
        assert_eq!(entry.description, "image changed");
    }

    #[test]
    fn port_order_does_not_matter() {
        let a = web().with_port(PortMapping::tcp(8443, 443));
        let mut b = web();
        b.ports.insert(0, PortMapping::tcp(8443, 443));

        let s1 = snapshot(vec![containers("srv1", Criticality::Important, vec![a])]);
        let s2 = snapshot(vec![containers("srv1", Criticality::Important, vec![b])]);
        assert!(diff(Some(&s1), &s2).unwrap().is_empty());
    }

    #[test]
    fn added_and_removed_containers() {
        let db = ContainerRecord::new("db", "postgres:16", RunState::Running);
        let cache = ContainerRecord::new("cache", "redis:7", RunState::Running);
        let s1 = snapshot(vec![containers(
            "srv1",
            Criticality::Critical,
            vec![web(), db],
        )]);
        let s2 = snapshot(vec![containers(
            "srv1",
            Criticality::Critical,
            vec![web(), cache],
        )]);

        let changes = diff(Some(&s1), &s2).unwrap();
        let kinds: Vec<(ChangeKind, &str, Severity)> = changes
            .entries()
            .iter()
            .map(|e| (e.kind, e.subject.as_str(), e.severity))
            .collect();
        assert_eq!(
            kinds,
            [
                (ChangeKind::Removed, "srv1/db", Severity::Critical),
                (ChangeKind::Added, "srv1/cache", Severity::Info),
            ]
        );
        assert_eq!(changes.entries()[0].description, "container removed");
    }

    #[test]
    fn recovered_target_is_reported_once() {
        let failed = PartialResult::failed(
            WorkItemKey::new("srv1".into(), CollectorKind::Containers),
            Criticality::Critical,
            FailureCause::Collector,
            "connection refused",
            3,
            100,
        );
        let s1 = snapshot(vec![failed]);
        let s2 = snapshot(vec![containers(
            "srv1",
            Criticality::Critical,
            vec![web()],
        )]);

        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        let entry = &changes.entries()[0];
        assert_eq!(entry.description, "became reachable again");
        assert_eq!(entry.severity, Severity::Info);
        assert_eq!(entry.kind, ChangeKind::Modified);
    }

    #[test]
    fn failing_in_both_snapshots_is_silent() {
        let failed = || {
            PartialResult::failed(
                WorkItemKey::new("srv1".into(), CollectorKind::HostFacts),
                Criticality::Critical,
                FailureCause::Timeout,
                "deadline",
                1,
                300_000,
            )
        };
        let s1 = snapshot(vec![failed()]);
        let s2 = snapshot(vec![failed()]);
        assert!(diff(Some(&s1), &s2).unwrap().is_empty());
    }

    #[test]
    fn compose_services_are_keyed_by_stack() {
        let stack = |image: &str| ComposeTopology {
            stacks: vec![ComposeStackRecord {
                name: "media".into(),
                path: "/opt/media/compose.yml".into(),
                version: None,
                services: vec![ComposeServiceRecord {
                    name: "jellyfin".into(),
                    image: Some(image.into()),
                    ..Default::default()
                }],
            }],
        };
        let result = |image: &str| {
            PartialResult::ok(
                "nas".into(),
                Criticality::Important,
                stack(image).into(),
                1,
                5,
            )
        };

        let baseline = diff(None, &snapshot(vec![result("jellyfin:10.9")])).unwrap();
        let subjects: Vec<&str> =
            baseline.entries().iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, ["nas/media", "nas/media/jellyfin"]);

        let s1 = snapshot(vec![result("jellyfin:10.9")]);
        let s2 = snapshot(vec![result("jellyfin:10.10")]);
        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.entries()[0].subject, "nas/media/jellyfin");
        assert_eq!(changes.entries()[0].domain, CollectorKind::Compose);
    }

    #[test]
    fn stacks_sharing_a_name_are_told_apart_by_path() {
        let stack = |path: &str, image: &str| ComposeStackRecord {
            name: "app".into(),
            path: path.into(),
            version: None,
            services: vec![ComposeServiceRecord {
                name: "web".into(),
                image: Some(image.into()),
                ..Default::default()
            }],
        };
        let result = |first_image: &str| {
            PartialResult::ok(
                "srv1".into(),
                Criticality::Important,
                ComposeTopology {
                    stacks: vec![
                        stack("/opt/app/compose.yml", first_image),
                        stack("/srv/app/compose.yml", "caddy:2"),
                    ],
                }
                .into(),
                1,
                5,
            )
        };

        let baseline = diff(None, &snapshot(vec![result("nginx:1.27")])).unwrap();
        assert_eq!(baseline.len(), 4);

        let s1 = snapshot(vec![result("nginx:1.27")]);
        let s2 = snapshot(vec![result("nginx:1.28")]);
        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        let entry = &changes.entries()[0];
        assert_eq!(entry.subject, "srv1/app@/opt/app/compose.yml/web");
        assert_eq!(entry.old_value.as_deref(), Some("nginx:1.27"));
        assert_eq!(entry.new_value.as_deref(), Some("nginx:1.28"));
    }

    #[test]
    fn duplicate_container_names_do_not_hide_changes() {
        let twin = |state: RunState| ContainerRecord::new("web", "nginx:1.27", state);
        let s1 = snapshot(vec![containers(
            "srv1",
            Criticality::Critical,
            vec![twin(RunState::Running), twin(RunState::Running)],
        )]);
        let s2 = snapshot(vec![containers(
            "srv1",
            Criticality::Critical,
            vec![twin(RunState::Running), twin(RunState::Dead)],
        )]);

        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.entries()[0].subject, "srv1/web#2");
        assert_eq!(changes.entries()[0].new_value.as_deref(), Some("dead"));
    }

    #[test]
    fn network_attachment_is_an_exposure_change() {
        let attached = web().with_network("proxy").with_network("internal");
        let detached = web().with_network("internal");
        let s1 = snapshot(vec![containers("srv1", Criticality::Critical, vec![attached])]);
        let s2 = snapshot(vec![containers("srv1", Criticality::Critical, vec![detached])]);

        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        let entry = &changes.entries()[0];
        assert_eq!(entry.field_path.as_deref(), Some("networks"));
        assert_eq!(entry.old_value.as_deref(), Some("internal, proxy"));
        assert_eq!(entry.new_value.as_deref(), Some("internal"));
        assert_eq!(entry.severity, Severity::Warning);
    }

    #[test]
    fn rotated_secret_is_reported_masked() {
        let db = |password: &str| {
            ContainerRecord::new("db", "postgres:16", RunState::Running)
                .with_env("POSTGRES_PASSWORD", password)
                .with_label("com.docker.compose.project", "db")
        };
        let s1 = snapshot(vec![containers("srv1", Criticality::Important, vec![db("short")])]);
        let s2 = snapshot(vec![containers(
            "srv1",
            Criticality::Important,
            vec![db("much-longer-secret")],
        )]);

        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        let entry = &changes.entries()[0];
        assert_eq!(entry.field_path.as_deref(), Some("environment"));
        assert_eq!(entry.severity, Severity::Info);
        let new = entry.new_value.as_deref().unwrap();
        assert!(new.contains("***REDACTED*** (length: 18)"), "{new}");
        assert!(!new.contains("much-longer-secret"));
    }

    #[test]
    fn out_of_order_comparison_is_an_error() {
        let older = snapshot(Vec::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = snapshot(Vec::new());
        assert!(matches!(
            diff(Some(&newer), &older),
            Err(DiffError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn host_address_change_is_a_warning() {
        let host = |addr: &str| {
            PartialResult::ok(
                "srv1".into(),
                Criticality::Critical,
                HostFacts {
                    hostname: Some("srv1".into()),
                    addresses: [addr.to_string()].into(),
                    uptime_seconds: Some(addr.len() as u64),
                    ..Default::default()
                }
                .into(),
                1,
                1,
            )
        };
        let s1 = snapshot(vec![host("192.168.1.10")]);
        let s2 = snapshot(vec![host("192.168.1.11")]);
        let changes = diff(Some(&s1), &s2).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.entries()[0].field_path.as_deref(), Some("addresses"));
        assert_eq!(changes.entries()[0].severity, Severity::Warning);
        assert_eq!(changes.entries()[0].subject, "srv1");
    }
}
