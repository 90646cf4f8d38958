// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::config::Config;
use crate::daemon::ManagedProcess;
use crate::error::NodevisorError;
use crate::supervisor::Supervisor;
use crate::updater::Updater;
use crate::upgrades::{recover_interrupted_replacement, store, BinaryReplacer};
use nym_upgrade_authority_client::{SemVer, UpgradeAuthorityClient};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Make sure there's a binary to launch: restore it from the store or, failing that,
/// install whatever release the authority currently suggests.
pub async fn ensure_binary(
    updater: &Updater,
    process: &ManagedProcess,
    shutdown: &CancellationToken,
) -> Result<(), NodevisorError> {
    let binary = process.binary_path();
    if binary.exists() {
        return Ok(());
    }

    if let Some(store_dir) = process.store_dir() {
        match store::restore_from_store(store_dir, binary) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => warn!(
                "failed to restore '{}' from the store at '{}': {err}",
                binary.display(),
                store_dir.display()
            ),
        }
    }

    info!(
        "'{}' does not exist - downloading the current release",
        binary.display()
    );
    if let Some(parent) = binary.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| NodevisorError::BinaryUnavailable {
            path: binary.to_path_buf(),
            reason: format!("could not create '{}': {err}", parent.display()),
        })?;
    }
    if !updater.update(process, &SemVer::ZERO, shutdown).await? {
        return Err(NodevisorError::BinaryUnavailable {
            path: binary.to_path_buf(),
            reason: format!(
                "the upgrade authority does not announce any release of '{}'",
                updater.process_name()
            ),
        });
    }
    Ok(())
}

/// Set everything up according to `config` and supervise the daemon until `shutdown` is cancelled.
///
/// `exec_binary` and `daemon_args` are what the supervisor got invoked with,
/// i.e. `nodevisor exec <exec_binary> <daemon_args>...`
pub async fn supervise(
    config: &Config,
    exec_binary: &Path,
    daemon_args: Vec<String>,
    shutdown: CancellationToken,
) -> Result<(), NodevisorError> {
    let binary = config.binary_location(exec_binary);
    recover_interrupted_replacement(&binary);

    let authority = UpgradeAuthorityClient::new(
        config.version_server_address.clone(),
        config.update_check_timeout,
    )?;
    let http = reqwest::Client::builder()
        .build()
        .map_err(|source| NodevisorError::HttpClientBuildFailure { source })?;
    let updater = Updater::new(
        authority,
        BinaryReplacer::new(http),
        config.process_name(&binary),
    );

    let mut launch_args = vec![exec_binary.display().to_string()];
    launch_args.extend(daemon_args);
    let process = ManagedProcess::new(
        config.node_id.clone(),
        binary,
        config.binary_store_dir.clone(),
        launch_args,
    );

    if let Err(err) = ensure_binary(&updater, &process, &shutdown).await {
        if err.is_cancelled() {
            info!("received shutdown before the daemon binary became available");
            return Ok(());
        }
        return Err(err);
    }

    info!(
        "starting nodevisor for '{}' (node: {})",
        updater.process_name(),
        config.node_id
    );
    Supervisor::new(updater, process, config.supervisor_config())
        .run(shutdown)
        .await?;
    Ok(())
}
