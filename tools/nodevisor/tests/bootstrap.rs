// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use common::*;
use nodevisor::bootstrap::{ensure_binary, supervise};
use nodevisor::config::Config;
use nodevisor::error::NodevisorError;
use nodevisor::upgrades::{backup_path, recover_interrupted_replacement, staging_path};
use nym_upgrade_authority_client::{ProcessRelease, Release, Rollout, SemVer};
use std::fs;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod common;

fn release(version: &str, url: String) -> ProcessRelease {
    ProcessRelease {
        minimum: Release::default(),
        suggested: Release {
            version: version.to_string(),
            url,
        },
        rollout: Rollout::default(),
    }
}

#[tokio::test]
async fn existing_binary_is_left_alone() {
    let ws = Workspace::new();
    ws.install(&long_running_daemon("1.2.0", &ws.launches));
    let original = fs::read(&ws.binary).unwrap();

    ensure_binary(
        &updater(FixedAuthority(None)),
        &ws.managed_process(None),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(fs::read(&ws.binary).unwrap(), original);
}

#[tokio::test]
async fn missing_binary_is_restored_from_store() {
    let ws = Workspace::new();
    let store = ws.dir.path().join("store");
    fs::create_dir_all(&store).unwrap();
    let stored = long_running_daemon("1.2.0", &ws.launches);
    write_executable(&store.join(PROCESS_NAME), &stored);

    ensure_binary(
        &updater(FixedAuthority(None)),
        &ws.managed_process(Some(store)),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(fs::read_to_string(&ws.binary).unwrap(), stored);
}

#[tokio::test]
async fn missing_binary_is_installed_from_the_authority() {
    let ws = Workspace::new();
    let store = ws.dir.path().join("store");

    let mut server = mockito::Server::new_async().await;
    let new_binary = long_running_daemon("1.3.0", &ws.launches);
    let _archive = server
        .mock("GET", "/storagenode.tar.gz")
        .with_status(200)
        .with_body(tar_gz(&[("storagenode", new_binary.as_bytes())]))
        .create_async()
        .await;

    // the rollout doesn't matter for the first install
    let authority = FixedAuthority(Some(release(
        "1.3.0",
        format!("{}/storagenode.tar.gz", server.url()),
    )));
    ensure_binary(
        &updater(authority),
        &ws.managed_process(Some(store.clone())),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(fs::read_to_string(&ws.binary).unwrap(), new_binary);
    assert_eq!(
        fs::read_to_string(store.join(PROCESS_NAME)).unwrap(),
        new_binary
    );
}

#[tokio::test]
async fn missing_binary_without_any_release_is_fatal() {
    let ws = Workspace::new();
    let err = ensure_binary(
        &updater(FixedAuthority(None)),
        &ws.managed_process(None),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, NodevisorError::BinaryUnavailable { .. }));
}

#[tokio::test]
async fn supervise_fails_without_binary_when_authority_is_unreachable() {
    let ws = Workspace::new();
    let config = Config::from_vars([
        (
            "NODEVISOR_VERSION_SERVER_ADDRESS".to_string(),
            "http://127.0.0.1:1".to_string(),
        ),
        ("NODEVISOR_NODE_ID".to_string(), "node".to_string()),
        ("NODEVISOR_UPDATE_CHECK_TIMEOUT".to_string(), "1s".to_string()),
    ])
    .unwrap();

    let err = supervise(
        &config,
        &ws.binary,
        vec!["run".to_string()],
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        NodevisorError::Update(ref update) if update.is_authority_unavailable()
    ));
}

#[tokio::test]
async fn shutdown_during_first_install_is_a_clean_exit() {
    let ws = Workspace::new();
    let config = Config::from_vars([
        ("NODEVISOR_VERSION_SERVER_ADDRESS".to_string(), silent_server().await),
        ("NODEVISOR_NODE_ID".to_string(), "node".to_string()),
        ("NODEVISOR_UPDATE_CHECK_TIMEOUT".to_string(), "30s".to_string()),
    ])
    .unwrap();

    let shutdown = CancellationToken::new();
    let handle = {
        let shutdown = shutdown.clone();
        let binary = ws.binary.clone();
        tokio::spawn(async move {
            supervise(&config, &binary, vec!["run".to_string()], shutdown).await
        })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();

    let res = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(res.is_ok());
    assert!(!ws.binary.exists());
}

#[test]
fn interrupted_replacement_is_recovered_on_startup() {
    let ws = Workspace::new();
    let backup = backup_path(&ws.binary, &SemVer::new(1, 2, 0));
    write_executable(&backup, "#!/bin/sh\necho 'Version: 1.2.0'\n");
    fs::write(staging_path(&ws.binary), b"half-written").unwrap();

    recover_interrupted_replacement(&ws.binary);

    assert_eq!(
        fs::read_to_string(&ws.binary).unwrap(),
        "#!/bin/sh\necho 'Version: 1.2.0'\n"
    );
    assert!(!backup.exists());
    assert!(!staging_path(&ws.binary).exists());
}
