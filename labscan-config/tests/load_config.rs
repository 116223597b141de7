use std::{fs, sync::Mutex};

use labscan_config::{
    CONFIG_JSON_ENV, CONFIG_PATH_ENV, ConfigSource, LabscanConfig,
};
use labscan_core::AlertTrigger;
use labscan_model::{CollectorKind, Criticality, Severity, TransportKind};
use tempfile::tempdir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const HOMELAB: &str = r#"
[[targets]]
name = "srv1"
hostname = "srv1"
tailscale_ip = "100.64.0.2"
local_ip = "${LABSCAN_TEST_SRV1_IP}"
role = "primary_server"
criticality = "critical"
compose_paths = ["/opt/stacks"]

[targets.ssh]
user = "ops"
key_path = "~/.ssh/id_ed25519"

[[targets]]
name = "pi"
hostname = "pi.lan"
lan_ip = "192.168.1.40"
criticality = "nice-to-have"

[scanning]
enabled_collectors = ["server_info", "docker", "compose_files"]
schedule_interval_secs = 3600

[scanning.orchestrator]
max_in_flight = 4

[scanning.orchestrator.retry]
max_attempts = 5
backoff_base_ms = 500

[[scanning.exclusions]]
target = "pi"
collector = "compose"

[store]
path = "/var/lib/labscan/snapshots"

[alerts]
triggers = ["scan_complete", "errors"]
min_severity = "critical"
"#;

fn clear_env() {
    for key in [CONFIG_PATH_ENV, CONFIG_JSON_ENV, "LABSCAN_TEST_SRV1_IP"] {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn toml_file_round_trips_into_scan_inputs() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    clear_env();
    unsafe { std::env::set_var("LABSCAN_TEST_SRV1_IP", "192.168.1.10") };

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("labscan.toml");
    fs::write(&path, HOMELAB).expect("write config");

    let config = LabscanConfig::load_from_file(&path).expect("load config");
    clear_env();

    assert!(config.validate().is_ok());

    let targets = config.scan_targets().expect("targets");
    assert_eq!(targets.len(), 2);
    let srv1 = &targets[0];
    assert_eq!(srv1.effective_criticality(), Criticality::Critical);
    assert!(srv1.has_transport(TransportKind::Lan));
    assert_eq!(srv1.primary_address(), "100.64.0.2");
    assert_eq!(srv1.compose_paths, ["/opt/stacks"]);
    assert_eq!(srv1.connection.user.as_deref(), Some("ops"));
    assert_eq!(srv1.connection.port, Some(22));

    assert_eq!(
        config.scanning.collectors().unwrap(),
        [
            CollectorKind::HostFacts,
            CollectorKind::Containers,
            CollectorKind::Compose
        ]
    );
    let orchestrator = config.scanning.orchestrator_config().unwrap();
    assert_eq!(orchestrator.max_in_flight, 4);
    assert_eq!(orchestrator.item_deadline_ms, 300_000);
    assert_eq!(orchestrator.retry.max_attempts, 5);
    assert_eq!(orchestrator.retry.backoff_base_ms, 500);
    assert_eq!(orchestrator.retry.backoff_max_ms, 30_000);
    assert!(orchestrator.is_excluded(&"pi".into(), CollectorKind::Compose));
    assert_eq!(config.scanning.schedule_interval().as_secs(), 3600);

    assert_eq!(
        config.store.path.to_str(),
        Some("/var/lib/labscan/snapshots")
    );
    assert_eq!(config.alerts.min_severity, Severity::Critical);
    assert!(config.alerts.triggers.contains(&AlertTrigger::ScanComplete));
    assert!(!config.alerts.triggers.contains(&AlertTrigger::ChangesDetected));
}

#[test]
fn env_path_wins_over_inline_json() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    clear_env();

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("homelab.conf");
    fs::write(&path, r#"{"targets": [{"name": "nas", "hostname": "nas.lan"}]}"#)
        .expect("write config");

    unsafe {
        std::env::set_var(CONFIG_PATH_ENV, &path);
        std::env::set_var(
            CONFIG_JSON_ENV,
            r#"{"targets": [{"name": "other", "hostname": "other"}]}"#,
        );
    }
    let (config, source) = LabscanConfig::load_from_env().expect("load");
    assert_eq!(source, ConfigSource::EnvPath(path.clone()));
    assert_eq!(config.targets[0].name, "nas");

    unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
    let (config, source) = LabscanConfig::load_from_env().expect("load");
    assert_eq!(source, ConfigSource::EnvInline);
    assert_eq!(config.targets[0].name, "other");
    clear_env();
}

#[test]
fn explicit_path_and_read_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    clear_env();

    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("nope.toml");
    let err = LabscanConfig::load(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("failed to read labscan config"));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").expect("write config");
    let err = LabscanConfig::load(Some(&broken)).unwrap_err();
    assert!(format!("{err:#}").contains("invalid labscan config"));
}
