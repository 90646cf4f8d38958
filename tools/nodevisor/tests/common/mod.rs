// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use nodevisor::{BinaryReplacer, ManagedProcess, NodeId, SupervisorConfig, Updater};
use nym_upgrade_authority_client::{AuthorityClientError, ProcessRelease};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const PROCESS_NAME: &str = "storagenode";

/// Authority that always answers with the same release.
pub struct FixedAuthority(pub Option<ProcessRelease>);

#[async_trait]
impl nodevisor::updater::ReleaseAuthority for FixedAuthority {
    async fn process_release(
        &self,
        _process_name: &str,
    ) -> Result<Option<ProcessRelease>, AuthorityClientError> {
        Ok(self.0.clone())
    }
}

/// Script reporting `version` on the version query. Every actual launch is recorded
/// as a line in `launches` before `on_launch` gets executed.
pub fn daemon_script(version: &str, launches: &Path, on_launch: &str) -> String {
    format!(
        r#"#!/bin/sh
if [ "$1" = "version" ]; then echo "Version: {version}"; exit 0; fi
echo "{version}" >> {launches}
{on_launch}
"#,
        launches = launches.display()
    )
}

pub fn long_running_daemon(version: &str, launches: &Path) -> String {
    daemon_script(version, launches, "exec sleep 30")
}

pub fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn launches(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub binary: PathBuf,
    pub launches: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join(PROCESS_NAME);
        let launches = dir.path().join("launches");
        Workspace {
            dir,
            binary,
            launches,
        }
    }

    pub fn install(&self, script: &str) {
        write_executable(&self.binary, script)
    }

    pub fn managed_process(&self, store_dir: Option<PathBuf>) -> ManagedProcess {
        ManagedProcess::new(
            NodeId::new("integration-test-node"),
            self.binary.clone(),
            store_dir,
            vec![
                self.binary.display().to_string(),
                "run".to_string(),
                "--config-dir=/tmp".to_string(),
            ],
        )
    }

    pub fn launches(&self) -> Vec<String> {
        launches(&self.launches)
    }
}

pub fn updater<A>(authority: A) -> Updater
where
    A: nodevisor::updater::ReleaseAuthority + 'static,
{
    Updater::new(
        authority,
        BinaryReplacer::new(reqwest::Client::new()),
        PROCESS_NAME,
    )
}

pub fn supervisor_config(check_interval: Duration) -> SupervisorConfig {
    SupervisorConfig {
        check_interval,
        restart_delay: Duration::from_millis(10),
        retry_reset_after: None,
        shutdown_grace_period: Duration::from_secs(5),
    }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Address of a server that accepts connections but never sends back a single byte.
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut connections = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            connections.push(stream);
        }
    });
    address
}
