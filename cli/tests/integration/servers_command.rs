//! Integration tests for commands that work from the local inventory alone.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const INVENTORY: &str = "\
servers:
  - name: fra-1
    host: 203.0.113.7
    identity_file: /nonexistent/id_ed25519
    max_configs: 2
    protocols:
      - protocol: xray
      - protocol: amneziawg
  - name: ams-2
    host: 198.51.100.4
    is_active: false
    protocols:
      - protocol: xray
";

fn vpnctl() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vpnctl"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("VPNCTL_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn with_config(path: &Path) -> Command {
    let mut cmd = vpnctl();
    cmd.arg("--config").arg(path);
    cmd
}

#[test]
fn test_servers_json_lists_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    let value = json_stdout(with_config(&path).args(["servers", "--json"]));
    let names: Vec<&str> = value["servers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["fra-1", "ams-2"]);
    assert_eq!(value["servers"][1]["is_active"], false);
}

#[test]
fn test_servers_reads_config_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    vpnctl()
        .env("VPNCTL_CONFIG", &path)
        .arg("servers")
        .assert()
        .success()
        .stdout(predicate::str::contains("fra-1"))
        .stdout(predicate::str::contains("inactive"));
}

#[test]
fn test_missing_config_means_empty_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let value = json_stdout(
        with_config(&dir.path().join("absent.yaml")).args(["servers", "--json"]),
    );
    assert_eq!(value["servers"], serde_json::json!([]));
}

#[test]
fn test_invalid_inventory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "servers:\n  - {name: a, host: h, is_active: false}\n  - {name: a, host: h, is_active: false}\n",
    );

    with_config(&path)
        .arg("servers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than once"));
}

#[test]
fn test_unknown_server_lists_configured_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    with_config(&path)
        .args(["add", "nyc-9", "xray", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("✗ Error: Unknown server: nyc-9"))
        .stderr(predicate::str::contains("fra-1, ams-2"));
}

#[test]
fn test_unknown_server_json_error_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    let value = json_stdout(with_config(&path).args(["clients", "nyc-9", "xray", "--json"]));
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "error");
}

#[test]
fn test_inactive_server_refuses_new_clients_without_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    let value = json_stdout(with_config(&path).args(["add", "ams-2", "xray", "alice", "--json"]));
    assert_eq!(value["code"], "server_inactive");
}

#[test]
fn test_full_server_refuses_new_clients() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);

    let value = json_stdout(
        with_config(&path).args(["add", "fra-1", "xray", "alice", "--issued", "2", "--json"]),
    );
    assert_eq!(value["code"], "capacity_exceeded");
}

#[test]
fn test_capacity_counts_records_per_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, INVENTORY);
    let records = dir.path().join("records.json");
    std::fs::write(
        &records,
        r#"[
  {"server": "fra-1", "protocol": "xray", "client_id": "a", "client_name": "alice",
   "created_at": "2026-01-05T10:00:00Z"},
  {"server": "fra-1", "protocol": "amneziawg", "client_id": "b", "client_name": "bob",
   "address": "10.8.1.1/32", "created_at": "2026-01-06T10:00:00Z", "is_active": false}
]"#,
    )
    .unwrap();

    let value = json_stdout(
        with_config(&path)
            .args(["capacity", "--json", "--records"])
            .arg(&records),
    );
    let fra = &value["servers"][0];
    assert_eq!(fra["server"], "fra-1");
    assert_eq!(fra["issued"], 2);
    assert_eq!(fra["available_slots"], 0);
    assert_eq!(fra["overloaded"], true);
    assert_eq!(value["servers"][1]["issued"], 0);
}
