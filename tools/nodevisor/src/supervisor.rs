// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::daemon::ManagedProcess;
use crate::error::SupervisorError;
use crate::tasks::launcher::DaemonLauncher;
use crate::tasks::upgrade_checker::UpgradeChecker;
use crate::updater::Updater;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// How often the upgrade authority is queried. Must be non-zero.
    pub check_interval: Duration,

    /// Pause between an unplanned daemon exit and its relaunch.
    pub restart_delay: Duration,

    /// A daemon run lasting at least this long resets the failure counter.
    pub retry_reset_after: Option<Duration>,

    /// How long the daemon is given to exit on shutdown before it gets killed.
    pub shutdown_grace_period: Duration,
}

/// Runs the daemon and keeps it up to date.
pub struct Supervisor {
    updater: Updater,
    process: Arc<ManagedProcess>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(updater: Updater, process: ManagedProcess, config: SupervisorConfig) -> Self {
        Supervisor {
            updater,
            process: Arc::new(process),
            config,
        }
    }

    pub fn process(&self) -> &Arc<ManagedProcess> {
        &self.process
    }

    /// Run until `shutdown` gets cancelled or the daemon keeps failing.
    ///
    /// Both the launcher and the upgrade checker are always stopped before this returns.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), SupervisorError> {
        let launcher = DaemonLauncher::new(
            self.process.clone(),
            self.config.restart_delay,
            self.config.retry_reset_after,
            self.config.shutdown_grace_period,
        );

        // the checker is only ever stopped with (or before) the launcher
        let checker_shutdown = shutdown.child_token();
        let checker = UpgradeChecker::new(
            self.updater,
            self.process.clone(),
            self.config.check_interval,
        );

        info!(
            "supervising '{}'",
            self.process.binary_path().display()
        );
        let launcher_handle = tokio::spawn(launcher.run(shutdown.clone()));
        let checker_handle = tokio::spawn(checker.run(checker_shutdown.clone()));

        let launcher_res = match launcher_handle.await {
            Ok(res) => res,
            Err(source) => Err(SupervisorError::TaskFailure {
                task: "launcher",
                source,
            }),
        };
        if let Err(err) = &launcher_res {
            error!("stopping the supervisor: {err}");
        }

        checker_shutdown.cancel();
        let checker_res = checker_handle
            .await
            .map_err(|source| SupervisorError::TaskFailure {
                task: "upgrade checker",
                source,
            });

        launcher_res?;
        checker_res?;
        info!("the supervisor has finished");
        Ok(())
    }
}
