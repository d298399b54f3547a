//! Tests for `AwgManager` against an in-memory host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use secrecy::SecretString;
use vpnctl_cli::application::services::AwgManager;
use vpnctl_cli::application::services::awg_manager::ArtifactRequest;
use vpnctl_cli::domain::ProvisionError;
use vpnctl_cli::infra::artifacts::ArtifactDir;
use vpnctl_common::{AccessMode, ProtocolKind};

use crate::mocks::{
    AWG_CONFIG, AWG_KEY, AWG_LEDGER, FakeHost, FakeKeys, PRESHARED_KEY, SERVER_PUBLIC_KEY,
    WG0_CONF, awg_host, ledger_ids, open, profile, server, server_with,
};

fn with_peers(addresses: &[(&str, &str)]) -> String {
    let mut text = WG0_CONF.to_string();
    for (key, address) in addresses {
        text.push_str(&format!("\n[Peer]\nPublicKey = {key}\nAllowedIPs = {address}\n"));
    }
    text
}

#[tokio::test]
async fn test_first_allocation_is_dot_one() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let address = AwgManager::new(&mut session)
        .unwrap()
        .allocate_address()
        .unwrap();
    session.close();
    assert_eq!(address, "10.8.1.1/32");
}

#[tokio::test]
async fn test_allocation_follows_highest_address() {
    let host =
        awg_host().with_file(AWG_CONFIG, &with_peers(&[("a=", "10.8.1.1/32"), ("b=", "10.8.1.2/32")]));
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let address = AwgManager::new(&mut session)
        .unwrap()
        .allocate_address()
        .unwrap();
    session.close();
    assert_eq!(address, "10.8.1.3/32");
}

#[tokio::test]
async fn test_disabled_peers_keep_their_address() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let mut manager = AwgManager::new(&mut session).unwrap();
    manager.add_peer("a=", None, "10.8.1.1/32", "a").await.unwrap();
    manager.disable_peer("a=").await.unwrap();

    assert_eq!(manager.allocate_address().unwrap(), "10.8.1.2/32");
    drop(manager);
    session.close();
}

#[tokio::test]
async fn test_full_pool_is_exhausted() {
    let host = awg_host().with_file(AWG_CONFIG, &with_peers(&[("z=", "10.8.1.254/32")]));
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let err = AwgManager::new(&mut session)
        .unwrap()
        .allocate_address()
        .unwrap_err();
    session.close();
    assert!(matches!(err, ProvisionError::PoolExhausted { .. }));
}

#[tokio::test]
async fn test_add_peer_writes_config_and_ledger() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    {
        let mut manager = AwgManager::new(&mut session).unwrap();
        let keys = manager.generate_keys(&FakeKeys::default());
        assert_eq!(keys.preshared_key.as_deref(), Some(PRESHARED_KEY));
        manager
            .add_peer(
                &keys.keypair.public_key,
                keys.preshared_key.as_deref(),
                "10.8.1.1/32",
                "alice",
            )
            .await
            .unwrap();
        assert!(manager.is_enabled("peer-1="));
    }
    session.finish(Ok(())).await.unwrap();

    let conf = host.file(AWG_CONFIG).unwrap();
    assert!(conf.starts_with(WG0_CONF));
    assert!(conf.ends_with(&format!(
        "\n[Peer]\nPublicKey = peer-1=\nPresharedKey = {PRESHARED_KEY}\nAllowedIPs = 10.8.1.1/32\n"
    )));
    assert_eq!(ledger_ids(&host, AWG_LEDGER), vec!["peer-1="]);
    let ledger = host.file(AWG_LEDGER).unwrap();
    assert!(ledger.contains("\"allowedIps\": \"10.8.1.1/32\""), "{ledger}");
    assert!(ledger.contains("\"dataReceived\": \"0 B\""), "{ledger}");
    assert_eq!(host.restarts(), vec!["amnezia-awg"]);
}

#[tokio::test]
async fn test_add_peer_without_preshared_key() {
    let host = awg_host();
    let server = server_with(vpnctl_common::ProtocolProfile {
        access: AccessMode::Volume,
        ..vpnctl_common::ProtocolProfile::new(ProtocolKind::AmneziaWg)
    });
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    AwgManager::new(&mut session)
        .unwrap()
        .add_peer("a=", None, "10.8.1.1/32", "a")
        .await
        .unwrap();
    session.close();

    assert!(!host.file(AWG_CONFIG).unwrap().contains("PresharedKey"));
}

#[tokio::test]
async fn test_duplicate_peer_is_rejected() {
    let host = awg_host().with_file(AWG_CONFIG, &with_peers(&[("a=", "10.8.1.1/32")]));
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let err = AwgManager::new(&mut session)
        .unwrap()
        .add_peer("a=", None, "10.8.1.2/32", "again")
        .await
        .unwrap_err();
    session.close();

    assert!(matches!(err, ProvisionError::AlreadyExists { .. }));
    assert!(host.pushed().is_empty());
}

#[tokio::test]
async fn test_remove_peer_then_lookup_is_not_found() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let mut manager = AwgManager::new(&mut session).unwrap();
    manager.add_peer("a=", None, "10.8.1.1/32", "a").await.unwrap();
    manager.add_peer("b=", None, "10.8.1.2/32", "b").await.unwrap();
    assert_eq!(manager.lookup_address("a=").unwrap(), "10.8.1.1/32");

    manager.remove_peer("a=").await.unwrap();
    let err = manager.lookup_address("a=").unwrap_err();
    assert!(matches!(err, ProvisionError::NotFound { .. }));
    assert!(!manager.peer_exists("a="));
    let again = manager.remove_peer("a=").await.unwrap_err();
    assert!(matches!(again, ProvisionError::NotFound { .. }));
    drop(manager);
    session.finish(Ok(())).await.unwrap();

    let conf = host.file(AWG_CONFIG).unwrap();
    assert!(!conf.contains("PublicKey = a="));
    assert!(conf.contains("PublicKey = b="));
    assert_eq!(ledger_ids(&host, AWG_LEDGER), vec!["b="]);
}

#[tokio::test]
async fn test_disable_comments_out_peer_and_enable_restores_it() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let mut manager = AwgManager::new(&mut session).unwrap();
    manager.add_peer("a=", None, "10.8.1.1/32", "a").await.unwrap();
    let enabled = host.file(AWG_CONFIG).unwrap();

    assert!(manager.disable_peer("a=").await.unwrap());
    let disabled = host.file(AWG_CONFIG).unwrap();
    assert!(disabled.contains("#! [Peer]\n#! PublicKey = a=\n#! AllowedIPs = 10.8.1.1/32\n"));
    assert!(!manager.is_enabled("a="));
    assert_eq!(manager.lookup_address("a=").unwrap(), "10.8.1.1/32");
    assert!(!manager.disable_peer("a=").await.unwrap());

    assert!(manager.enable_peer("a=").await.unwrap());
    assert!(!manager.enable_peer("a=").await.unwrap());
    drop(manager);
    session.close();

    assert_eq!(host.file(AWG_CONFIG).unwrap(), enabled);
    assert_eq!(ledger_ids(&host, AWG_LEDGER), vec!["a="]);
}

#[tokio::test]
async fn test_toggling_unknown_peer_is_not_found() {
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let err = AwgManager::new(&mut session)
        .unwrap()
        .enable_peer("nobody=")
        .await
        .unwrap_err();
    session.close();
    assert!(matches!(err, ProvisionError::NotFound { .. }));
}

#[tokio::test]
async fn test_client_artifact_carries_server_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ArtifactDir::new(dir.path().to_path_buf());
    let host = awg_host();
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let manager = AwgManager::new(&mut session).unwrap();
    let private_key = SecretString::from("cHJpdmF0ZQ==".to_string());

    let path = manager
        .build_client_artifact(
            &writer,
            &ArtifactRequest {
                client_name: "alice laptop",
                private_key: &private_key,
                preshared_key: Some(PRESHARED_KEY),
                address: "10.8.1.4/32",
            },
        )
        .await
        .unwrap();
    drop(manager);
    session.close();

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("wg_alice_laptop_"), "{name}");
    assert!(name.ends_with(".conf"), "{name}");
    let text = std::fs::read_to_string(&path).unwrap();
    let expected = [
        "Address = 10.8.1.4/32".to_string(),
        "PrivateKey = cHJpdmF0ZQ==".to_string(),
        "Jc = 4".to_string(),
        "H4 = 1109218730".to_string(),
        format!("PublicKey = {SERVER_PUBLIC_KEY}"),
        format!("PresharedKey = {PRESHARED_KEY}"),
        "Endpoint = 203.0.113.7:46446".to_string(),
        "PersistentKeepalive = 25".to_string(),
    ];
    for line in &expected {
        assert!(text.contains(line.as_str()), "missing {line:?} in\n{text}");
    }
    assert!(host.fetched().iter().any(|p| p == AWG_KEY));
}

#[tokio::test]
async fn test_missing_obfuscation_value_is_file_sync() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ArtifactDir::new(dir.path().to_path_buf());
    let host = awg_host().with_file(AWG_CONFIG, &WG0_CONF.replace("Jmin = 10\n", ""));
    let server = server(ProtocolKind::AmneziaWg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let manager = AwgManager::new(&mut session).unwrap();
    let private_key = SecretString::from("cHJpdmF0ZQ==".to_string());

    let err = manager
        .build_client_artifact(
            &writer,
            &ArtifactRequest {
                client_name: "bob",
                private_key: &private_key,
                preshared_key: None,
                address: "10.8.1.1/32",
            },
        )
        .await
        .unwrap_err();
    drop(manager);
    session.close();

    assert!(err.to_string().contains("Jmin"), "{err}");
    assert!(matches!(err, ProvisionError::FileSync { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_lookup_without_ledger_reads_allowed_ips() {
    let host = FakeHost::new().with_file(AWG_CONFIG, &with_peers(&[("a=", "10.8.1.7/32")]));
    let mut awg = profile(ProtocolKind::AmneziaWg, AccessMode::Volume);
    awg.ledger = false;
    let server = server_with(awg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    let manager = AwgManager::new(&mut session).unwrap();

    assert_eq!(manager.lookup_address("a=").unwrap(), "10.8.1.7/32");
    let clients = manager.clients();
    drop(manager);
    session.close();

    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].address.as_deref(), Some("10.8.1.7/32"));
    assert!(!clients[0].in_ledger);
    assert!(!host.fetched().iter().any(|p| p == AWG_LEDGER));
}

#[tokio::test]
async fn test_add_peer_without_ledger_only_touches_wg0() {
    let host = FakeHost::new().with_file(AWG_CONFIG, WG0_CONF);
    let mut awg = profile(ProtocolKind::AmneziaWg, AccessMode::Volume);
    awg.ledger = false;
    let server = server_with(awg);
    let mut session = open(&host, &server, ProtocolKind::AmneziaWg).await;
    {
        let mut manager = AwgManager::new(&mut session).unwrap();
        manager
            .add_peer("bmV3LXBlZXI=", Some(PRESHARED_KEY), "10.8.1.1/32", "frank")
            .await
            .unwrap();
        assert!(manager.peer_exists("bmV3LXBlZXI="));
    }
    session.finish(Ok(())).await.unwrap();

    let text = host.file(AWG_CONFIG).unwrap();
    assert!(text.contains("PublicKey = bmV3LXBlZXI="), "{text}");
    assert!(text.contains("AllowedIPs = 10.8.1.1/32"), "{text}");
    assert_eq!(host.pushed(), vec![AWG_CONFIG]);
    assert!(!host.fetched().iter().any(|p| p == AWG_LEDGER));
    assert!(host.file(AWG_LEDGER).is_none());
    assert_eq!(host.restarts(), vec!["amnezia-awg"]);
}
