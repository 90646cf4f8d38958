// Copyright 2025 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use crate::daemon::{ExitIntent, ManagedProcess};
use crate::error::ProcessError;
use crate::updater::Updater;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodically asks the upgrade authority for a new release and,
/// once one got installed, restarts the daemon onto it.
pub struct UpgradeChecker {
    updater: Updater,
    process: Arc<ManagedProcess>,
    check_interval: Duration,
}

impl UpgradeChecker {
    pub fn new(updater: Updater, process: Arc<ManagedProcess>, check_interval: Duration) -> Self {
        UpgradeChecker {
            updater,
            process,
            check_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        // the first tick completes immediately
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("upgrade checker: received shutdown");
                    break;
                }
                _ = ticker.tick() => self.check_for_upgrade(&shutdown).await,
            }
        }
    }

    async fn check_for_upgrade(&self, shutdown: &CancellationToken) {
        let current = match self.process.probe_version(shutdown).await {
            Ok(version) => version,
            Err(ProcessError::ProbeCancelled { .. }) => return,
            Err(err) => {
                error!("could not determine the version of the current binary: {err}");
                return;
            }
        };
        debug!("the current binary reports version {current}");

        match self.updater.update(&self.process, &current, shutdown).await {
            Ok(false) => {}
            Ok(true) => {
                info!("restarting the daemon onto the upgraded binary");
                if let Err(err) = self.process.exit_with_intent(ExitIntent::Upgrade) {
                    error!("failed to stop the daemon for the upgrade: {err}");
                }
            }
            Err(err) if err.is_cancelled() => debug!("upgrade check interrupted by shutdown"),
            Err(err) if err.is_authority_unavailable() => {
                warn!("skipping this upgrade check: {err}")
            }
            Err(err) => error!("the upgrade check has failed: {err}"),
        }
    }
}
