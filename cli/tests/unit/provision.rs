//! Tests for `Provisioner`: eligibility, connection handling and the
//! end-to-end issue/revoke flows.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tempfile::TempDir;
use vpnctl_cli::application::services::{
    ExistingPeer, IssuedCredential, Provisioner, ProvisionerOptions, SessionLocks,
};
use vpnctl_cli::domain::ProvisionError;
use vpnctl_cli::infra::artifacts::ArtifactDir;
use vpnctl_common::{AccessMode, ProtocolKind, ServerLoad};

use crate::mocks::{
    AWG_CONFIG, AWG_LEDGER, FakeConnector, FakeHost, FakeKeys, SERVER_JSON, SERVER_PUBLIC_KEY,
    XRAY_CONFIG, XRAY_KEY, XRAY_LEDGER, awg_host, ledger_ids, profile, server, server_with,
    xray_clients, xray_host,
};

struct Harness {
    connector: FakeConnector,
    provisioner: Provisioner<FakeConnector, FakeKeys, ArtifactDir>,
    artifacts: TempDir,
}

fn harness(connector: FakeConnector) -> Harness {
    let artifacts = tempfile::tempdir().unwrap();
    let provisioner = Provisioner::new(
        connector.clone(),
        FakeKeys::default(),
        ArtifactDir::new(artifacts.path().to_path_buf()),
        ProvisionerOptions::default(),
    );
    Harness {
        connector,
        provisioner,
        artifacts,
    }
}

fn light_load() -> ServerLoad {
    ServerLoad::new(100, 3)
}

#[tokio::test]
async fn test_capacity_is_checked_before_connecting() {
    let h = harness(FakeConnector::new(xray_host()));
    let server = server(ProtocolKind::Xray);

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", ServerLoad::new(100, 100))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::CapacityExceeded {
            issued: 100,
            max_configs: 100,
            ..
        }
    ));
    assert_eq!(h.connector.attempts(), 0);
}

#[tokio::test]
async fn test_inactive_server_refuses_new_clients_without_connecting() {
    let h = harness(FakeConnector::new(xray_host()));
    let mut server = server(ProtocolKind::Xray);
    server.is_active = false;

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", light_load())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::ServerInactive(ref name) if name == "fra-1"));
    assert_eq!(h.connector.attempts(), 0);
}

#[tokio::test]
async fn test_unsupported_protocol_is_rejected_without_connecting() {
    let h = harness(FakeConnector::new(xray_host()));
    let server = server(ProtocolKind::Xray);

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::AmneziaWg, "alice", light_load())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::UnsupportedProtocol { .. }));
    assert_eq!(h.connector.attempts(), 0);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let h = harness(FakeConnector::refusing(xray_host()));
    let server = server(ProtocolKind::Xray);

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", light_load())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Connect { .. }));
    assert_eq!(err.code(), "transport");
}

#[tokio::test]
async fn test_issue_xray_returns_link_and_closes_connection() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::Xray);

    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", light_load())
        .await
        .unwrap();

    let IssuedCredential::Xray {
        client_id,
        client_name,
        url,
    } = &issued
    else {
        panic!("expected an xray credential, got {issued:?}");
    };
    assert!(url.starts_with(&format!("vless://{client_id}@203.0.113.7:443?")));
    assert!(url.contains(&format!("pbk={SERVER_PUBLIC_KEY}")));
    assert!(client_name.starts_with("alice_"));
    assert_eq!(
        xray_clients(&host, XRAY_CONFIG),
        vec![(client_id.clone(), client_name.clone())]
    );
    assert_eq!(ledger_ids(&host, XRAY_LEDGER), vec![client_id.clone()]);
    assert_eq!(host.restarts(), vec!["amnezia-xray"]);
    assert_eq!(host.closed(), 1);

    let json = serde_json::to_value(&issued).unwrap();
    assert_eq!(json["protocol"], "xray");
    assert_eq!(json["client_id"], client_id.as_str());
}

#[tokio::test]
async fn test_issue_awg_writes_peer_and_client_file() {
    let host = awg_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);

    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::AmneziaWg, " bob ", light_load())
        .await
        .unwrap();

    let IssuedCredential::AmneziaWg {
        client_id,
        client_name,
        private_key,
        address,
        artifact,
        ..
    } = &issued
    else {
        panic!("expected an amneziawg credential, got {issued:?}");
    };
    assert_eq!(client_id, "peer-1=");
    assert_eq!(client_name, "bob");
    assert_eq!(address, "10.8.1.1/32");
    assert!(artifact.starts_with(h.artifacts.path()));
    let text = std::fs::read_to_string(artifact).unwrap();
    assert!(text.contains(&format!("PrivateKey = {}", private_key.expose_secret())));
    assert!(text.contains("Address = 10.8.1.1/32"));
    assert!(host.file(AWG_CONFIG).unwrap().contains("PublicKey = peer-1="));
    assert_eq!(ledger_ids(&host, AWG_LEDGER), vec!["peer-1="]);
    assert_eq!(host.closed(), 1);

    let json = serde_json::to_string(&issued).unwrap();
    assert!(json.contains("\"protocol\":\"amneziawg\""), "{json}");
    assert!(!json.contains("private-1"), "private key leaked: {json}");
}

#[tokio::test]
async fn test_second_awg_issue_gets_next_address() {
    let host = awg_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);

    for expected in ["10.8.1.1/32", "10.8.1.2/32"] {
        let issued = h
            .provisioner
            .issue(&server, ProtocolKind::AmneziaWg, "c", light_load())
            .await
            .unwrap();
        let IssuedCredential::AmneziaWg { address, .. } = issued else {
            panic!("expected an amneziawg credential");
        };
        assert_eq!(address, expected);
    }
    assert_eq!(host.closed(), 2);
}

#[tokio::test]
async fn test_awg_issue_without_obfuscation_changes_nothing() {
    let host = awg_host();
    let conf = host.file(AWG_CONFIG).unwrap().replace("S1 = 96\n", "");
    host.write_file(AWG_CONFIG, &conf);
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::AmneziaWg, "bob", light_load())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::FileSync { .. }));
    assert!(host.pushed().is_empty());
    assert_eq!(host.file(AWG_CONFIG).unwrap(), conf);
    assert_eq!(std::fs::read_dir(h.artifacts.path()).unwrap().count(), 0);
    assert_eq!(host.closed(), 1);
}

#[tokio::test]
async fn test_failed_awg_restart_removes_client_file() {
    let host = awg_host();
    host.fail_restart();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);

    let err = h
        .provisioner
        .issue(&server, ProtocolKind::AmneziaWg, "bob", light_load())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Transport { .. }));
    assert_eq!(std::fs::read_dir(h.artifacts.path()).unwrap().count(), 0);
    assert_eq!(host.closed(), 1);
}

#[tokio::test]
async fn test_revoke_unknown_client_still_restarts_and_closes() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::Xray);

    let err = h
        .provisioner
        .revoke(&server, ProtocolKind::Xray, "missing")
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::NotFound { .. }));
    assert_eq!(host.restarts(), vec!["amnezia-xray"]);
    assert_eq!(host.closed(), 1);
}

#[tokio::test]
async fn test_revoke_on_inactive_server_is_allowed() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let mut server = server(ProtocolKind::Xray);

    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", light_load())
        .await
        .unwrap();
    server.is_active = false;
    h.provisioner
        .revoke(&server, ProtocolKind::Xray, issued.client_id())
        .await
        .unwrap();

    assert!(xray_clients(&host, XRAY_CONFIG).is_empty());
    assert!(ledger_ids(&host, XRAY_LEDGER).is_empty());
}

#[tokio::test]
async fn test_reenable_xray_client_restores_ledger_name() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::Xray);
    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "alice", light_load())
        .await
        .unwrap();
    let id = issued.client_id();

    let disabled = h
        .provisioner
        .set_enabled(&server, ProtocolKind::Xray, id, None, false)
        .await
        .unwrap();
    assert!(disabled);
    assert!(xray_clients(&host, XRAY_CONFIG).is_empty());

    let enabled = h
        .provisioner
        .set_enabled(&server, ProtocolKind::Xray, id, None, true)
        .await
        .unwrap();
    assert!(enabled);
    assert_eq!(
        xray_clients(&host, XRAY_CONFIG),
        vec![(id.to_string(), issued.client_name().to_string())]
    );

    let again = h
        .provisioner
        .set_enabled(&server, ProtocolKind::Xray, id, None, true)
        .await
        .unwrap();
    assert!(!again);
}

#[tokio::test]
async fn test_disabling_unknown_xray_client_is_not_found() {
    let h = harness(FakeConnector::new(xray_host()));
    let server = server(ProtocolKind::Xray);

    let err = h
        .provisioner
        .set_enabled(&server, ProtocolKind::Xray, "missing", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::NotFound { .. }));
}

#[tokio::test]
async fn test_ledgerless_xray_client_disable_then_enable() {
    let host = FakeHost::new()
        .with_file(XRAY_CONFIG, SERVER_JSON)
        .with_file(XRAY_KEY, SERVER_PUBLIC_KEY);
    let mut xray = profile(ProtocolKind::Xray, AccessMode::Volume);
    xray.ledger = false;
    let server = server_with(xray);
    let h = harness(FakeConnector::new(host.clone()));
    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "erin", light_load())
        .await
        .unwrap();
    let id = issued.client_id();

    assert!(
        h.provisioner
            .set_enabled(&server, ProtocolKind::Xray, id, None, false)
            .await
            .unwrap()
    );
    assert!(xray_clients(&host, XRAY_CONFIG).is_empty());

    assert!(
        h.provisioner
            .set_enabled(&server, ProtocolKind::Xray, id, Some(issued.client_name()), true)
            .await
            .unwrap()
    );
    assert_eq!(
        xray_clients(&host, XRAY_CONFIG),
        vec![(id.to_string(), issued.client_name().to_string())]
    );
    assert!(host.file(XRAY_LEDGER).is_none());
}

#[tokio::test]
async fn test_enable_accepts_client_missing_from_ledger() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::Xray);
    let id = "11111111-1111-4111-8111-111111111111";

    let changed = h
        .provisioner
        .set_enabled(&server, ProtocolKind::Xray, id, Some("gil"), true)
        .await
        .unwrap();

    assert!(changed);
    assert_eq!(xray_clients(&host, XRAY_CONFIG), vec![(id.to_string(), "gil".to_string())]);
    assert!(ledger_ids(&host, XRAY_LEDGER).is_empty());
}

#[tokio::test]
async fn test_inspect_lists_clients_without_restart() {
    let host = awg_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);
    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::AmneziaWg, "dana", light_load())
        .await
        .unwrap();
    let restarts_before = host.restarts().len();

    let clients = h
        .provisioner
        .inspect(&server, ProtocolKind::AmneziaWg)
        .await
        .unwrap();

    assert_eq!(host.restarts().len(), restarts_before);
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].client_id, issued.client_id());
    assert_eq!(clients[0].client_name, "dana");
    assert_eq!(clients[0].address.as_deref(), Some("10.8.1.1/32"));
    assert!(clients[0].enabled);
    assert!(clients[0].in_ledger);
}

#[tokio::test]
async fn test_client_url_for_existing_client() {
    let host = xray_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::Xray);
    let issued = h
        .provisioner
        .issue(&server, ProtocolKind::Xray, "erin", light_load())
        .await
        .unwrap();

    let url = h
        .provisioner
        .client_url(&server, issued.client_id(), issued.client_name())
        .await
        .unwrap();
    let IssuedCredential::Xray { url: original, .. } = &issued else {
        panic!("expected an xray credential");
    };
    assert_eq!(&url, original);

    let err = h
        .provisioner
        .client_url(&server, "missing", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::NotFound { .. }));
}

#[tokio::test]
async fn test_client_artifact_uses_ledger_address() {
    let host = awg_host();
    let h = harness(FakeConnector::new(host.clone()));
    let server = server(ProtocolKind::AmneziaWg);
    for name in ["first", "second"] {
        h.provisioner
            .issue(&server, ProtocolKind::AmneziaWg, name, light_load())
            .await
            .unwrap();
    }
    let private_key = SecretString::from("cmVidWlsdA==".to_string());

    let path = h
        .provisioner
        .client_artifact(
            &server,
            &ExistingPeer {
                public_key: "peer-2=",
                private_key: &private_key,
                client_name: "second",
                address: None,
            },
        )
        .await
        .unwrap();

    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("Address = 10.8.1.2/32"), "{text}");
    assert!(text.contains("PrivateKey = cmVidWlsdA=="), "{text}");

    let err = h
        .provisioner
        .client_artifact(
            &server,
            &ExistingPeer {
                public_key: "nobody=",
                private_key: &private_key,
                client_name: "nobody",
                address: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::NotFound { .. }));
}

#[tokio::test]
async fn test_shared_locks_serialize_provisioners() {
    let locks = SessionLocks::new();
    let connector = FakeConnector::new(xray_host());
    let artifacts = tempfile::tempdir().unwrap();
    let provisioner = Provisioner::new(
        connector,
        FakeKeys::default(),
        ArtifactDir::new(artifacts.path().to_path_buf()),
        ProvisionerOptions::default(),
    )
    .with_locks(locks.clone());
    let server = server(ProtocolKind::Xray);

    let held = locks.acquire("fra-1", ProtocolKind::Xray).await;
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        provisioner.inspect(&server, ProtocolKind::Xray),
    )
    .await;
    assert!(blocked.is_err(), "inspect must wait for the held session");

    drop(held);
    assert!(provisioner.inspect(&server, ProtocolKind::Xray).await.unwrap().is_empty());
}
