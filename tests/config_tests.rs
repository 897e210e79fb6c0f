// Config loading and validation tests

use pupd::config::AppConfig;
use std::net::Ipv4Addr;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[storage]
pups_dir = "data/pups"
config_dir = "data/nix"
snapshot_dir = "data/snapshots"

[monitoring]
slow_interval_ms = 5000
fast_interval_ms = 500
metric_buffer_size = 30
stats_log_interval_secs = 60

[publishing]
subscriber_capacity = 16

[rebuild]
command = ["nixos-rebuild", "switch"]

[[sources]]
id = "local"
path = "data/catalog"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.storage.pups_dir.to_str(), Some("data/pups"));
    assert!(config.storage.data_dir.is_none());
    assert_eq!(config.monitoring.slow_interval_ms, 5000);
    assert_eq!(config.monitoring.fast_poll_count, 10);
    assert_eq!(config.publishing.subscriber_capacity, 16);
    assert_eq!(config.rebuild.command, vec!["nixos-rebuild", "switch"]);
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].id, "local");
}

#[test]
fn test_allocation_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.allocation.ip_base, Ipv4Addr::new(10, 69, 0, 1));
    assert_eq!(config.allocation.ip_ceiling, Ipv4Addr::new(10, 69, 255, 254));
    assert_eq!(config.allocation.port_start, 10000);
}

#[test]
fn test_allocation_overrides() {
    let custom = format!(
        "{VALID_CONFIG}\n[allocation]\nip_base = \"172.20.0.1\"\nip_ceiling = \"172.20.0.50\"\nport_start = 20000\n"
    );
    let config = AppConfig::load_from_str(&custom).unwrap();
    assert_eq!(config.allocation.ip_base, Ipv4Addr::new(172, 20, 0, 1));
    assert_eq!(config.allocation.port_start, 20000);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_pups_dir() {
    let bad = VALID_CONFIG.replace("pups_dir = \"data/pups\"", "pups_dir = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("storage.pups_dir"));
}

#[test]
fn test_config_validation_rejects_snapshots_inside_config_dir() {
    let bad = VALID_CONFIG.replace(
        "snapshot_dir = \"data/snapshots\"",
        "snapshot_dir = \"data/nix/snapshots\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("storage.snapshot_dir"));
}

#[test]
fn test_config_validation_rejects_inverted_ip_range() {
    let bad = format!(
        "{VALID_CONFIG}\n[allocation]\nip_base = \"10.69.0.9\"\nip_ceiling = \"10.69.0.1\"\n"
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("allocation.ip_base"));
}

#[test]
fn test_config_validation_rejects_slow_interval_zero() {
    let bad = VALID_CONFIG.replace("slow_interval_ms = 5000", "slow_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("slow_interval_ms"));
}

#[test]
fn test_config_validation_rejects_metric_buffer_size_zero() {
    let bad = VALID_CONFIG.replace("metric_buffer_size = 30", "metric_buffer_size = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("metric_buffer_size"));
}

#[test]
fn test_config_validation_rejects_subscriber_capacity_zero() {
    let bad = VALID_CONFIG.replace("subscriber_capacity = 16", "subscriber_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("subscriber_capacity"));
}

#[test]
fn test_config_validation_rejects_empty_rebuild_command() {
    let bad = VALID_CONFIG.replace("command = [\"nixos-rebuild\", \"switch\"]", "command = []");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("rebuild.command"));
}

#[test]
fn test_config_validation_rejects_empty_source_id() {
    let bad = VALID_CONFIG.replace("id = \"local\"", "id = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sources[].id"));
}

#[test]
fn test_config_rejects_missing_section() {
    let bad = VALID_CONFIG.replace("[rebuild]\ncommand = [\"nixos-rebuild\", \"switch\"]\n", "");
    assert!(AppConfig::load_from_str(&bad).is_err());
}
